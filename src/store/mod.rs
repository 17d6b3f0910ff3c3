//! Credential persistence: the single token record and its in-memory cache.
//!
//! Layout:
//! - `models.rs`: the on-disk record shape
//! - `file.rs`: file-backed store with explicit reload and serialized writes

pub mod file;
pub mod models;

pub use file::CredentialStore;
pub use models::CredentialRecord;
