use serde::{Deserialize, Serialize};

/// The persisted credential: `{ "id_token": "<string>" }`.
///
/// Only one record exists at a time; every write overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id_token: String,
}

impl CredentialRecord {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
        }
    }
}
