//! Document CRUD pass-through on top of [`FirestoreClient::request`].

use super::firestore_api::FirestoreClient;
use crate::error::NexusError;
use crate::types::firestore::Authorization;

use reqwest::Method;
use serde_json::{Value, json};
use url::form_urlencoded;

impl FirestoreClient {
    /// `databases/{database}/documents/{collection}[/{id}]`
    pub fn documents_path(&self, collection: &str, id: Option<&str>) -> String {
        let base = format!(
            "databases/{}/documents/{}",
            self.store().database(),
            collection.trim_matches('/')
        );
        match id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    /// Create a document; with `id`, Firestore answers 409 `ALREADY_EXISTS`
    /// when it is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Value,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let mut path = self.documents_path(collection, None);
        if let Some(id) = id {
            let encoded: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
            path = format!("{path}?documentId={encoded}");
        }
        let body = json!({ "fields": fields });
        self.request(Method::POST, &path, Some(&body), auth).await
    }

    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let path = self.documents_path(collection, Some(id));
        self.request(Method::GET, &path, None, auth).await
    }

    pub async fn list_documents(
        &self,
        collection: &str,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let path = self.documents_path(collection, None);
        self.request(Method::GET, &path, None, auth).await
    }

    pub async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let path = self.documents_path(collection, Some(id));
        let body = json!({ "fields": fields });
        self.request(Method::PATCH, &path, Some(&body), auth).await
    }

    pub async fn delete_document(
        &self,
        collection: &str,
        id: &str,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let path = self.documents_path(collection, Some(id));
        self.request(Method::DELETE, &path, None, auth).await
    }
}
