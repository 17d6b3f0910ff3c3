use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Which bearer token, if any, a document request carries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Authorization {
    /// Token from the credential store (persisted record, then override).
    #[default]
    Stored,
    /// Caller-supplied token; the store is not consulted.
    Explicit(String),
    /// No `Authorization` header at all.
    Unauthenticated,
}

impl From<&str> for Authorization {
    fn from(token: &str) -> Self {
        Authorization::Explicit(token.to_string())
    }
}

impl From<String> for Authorization {
    fn from(token: String) -> Self {
        Authorization::Explicit(token)
    }
}

/// Firestore error envelope: `{ "error": { code, message, status } }`.
#[derive(Deserialize, Debug, Clone)]
pub struct FirestoreError {
    pub error: FirestoreErrorBody,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FirestoreErrorBody {
    pub code: u16,
    pub message: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl FirestoreError {
    /// Typed view of a response body; `None` when it is not an error envelope.
    pub fn from_value(body: &Value) -> Option<Self> {
        body.get("error")?;
        serde_json::from_value(body.clone()).ok()
    }

    pub fn is_already_exists(&self) -> bool {
        self.error.status == "ALREADY_EXISTS"
    }

    pub fn is_permission_denied(&self) -> bool {
        self.error.status == "PERMISSION_DENIED"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn permission_denied_envelope() {
        let body = json!({
            "error": {
                "code": 403,
                "message": "Missing or insufficient permissions.",
                "status": "PERMISSION_DENIED"
            }
        });
        let err = FirestoreError::from_value(&body).unwrap();
        assert_eq!(err.error.code, 403);
        assert!(err.is_permission_denied());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn document_is_not_an_error() {
        let body = json!({
            "name": "projects/p/databases/(default)/documents/users/1",
            "fields": { "lastname": { "stringValue": "Jeff" } }
        });
        assert!(FirestoreError::from_value(&body).is_none());
    }

    #[test]
    fn extra_fields_are_kept() {
        let body = json!({
            "error": {
                "code": 409,
                "message": "Document already exists",
                "status": "ALREADY_EXISTS",
                "details": []
            }
        });
        let err = FirestoreError::from_value(&body).unwrap();
        assert!(err.is_already_exists());
        assert!(err.error.extra.contains_key("details"));
    }
}
