use crate::config::Config;
use crate::error::NexusError;
use crate::store::CredentialStore;
use crate::types::firestore::Authorization;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// REST client for the document database.
///
/// Every call goes through [`FirestoreClient::request`], which attaches the
/// bearer token chosen by the [`Authorization`] directive and returns the
/// response body as JSON, error envelopes included.
#[derive(Clone)]
pub struct FirestoreClient {
    cfg: Arc<Config>,
    http_client: reqwest::Client,
    store: CredentialStore,
}

impl FirestoreClient {
    pub fn new(cfg: Arc<Config>, http_client: reqwest::Client, store: CredentialStore) -> Self {
        Self {
            cfg,
            http_client,
            store,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// `{firestore_base}/v1/projects/{project_id}` for the current project.
    pub fn host(&self) -> String {
        format!(
            "{}/v1/projects/{}",
            self.cfg.firestore_base.as_str().trim_end_matches('/'),
            self.store.project_id()
        )
    }

    pub fn url_for(&self, resource_path: &str) -> Result<Url, NexusError> {
        let path = resource_path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", self.host(), path))?)
    }

    pub fn resolve_bearer(&self, auth: &Authorization) -> Option<String> {
        match auth {
            Authorization::Stored => self.store.current_token(),
            Authorization::Explicit(token) => Some(token.clone()),
            Authorization::Unauthenticated => None,
        }
    }

    /// Send one authorized request and return the parsed body.
    ///
    /// HTTP error statuses are not errors here: Firestore's
    /// `{ "error": { code, message, status } }` envelope comes back as the
    /// returned value. Only transport and decoding failures are `Err`.
    pub async fn request(
        &self,
        method: Method,
        resource_path: &str,
        body: Option<&Value>,
        auth: &Authorization,
    ) -> Result<Value, NexusError> {
        let url = self.url_for(resource_path)?;
        let mut req = self
            .http_client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.resolve_bearer(auth) {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!(%method, path = resource_path, %status, len = bytes.len(), "firestore response");

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
