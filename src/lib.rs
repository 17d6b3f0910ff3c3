pub mod api;
pub mod config;
pub mod error;
pub mod firebase_auth;
pub mod service;
pub mod store;
pub mod types;

pub use api::FirestoreClient;
pub use config::Config;
pub use error::NexusError;
pub use firebase_auth::TokenAcquirer;
pub use service::{AuthSession, RefreshHandle, RefreshStatus, refresh_delay};
pub use store::CredentialStore;
pub use types::auth::{RefreshDescriptor, SignInOutcome, SignInParams};
pub use types::firestore::{Authorization, FirestoreError};
