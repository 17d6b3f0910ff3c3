pub mod documents;
pub mod firestore_api;

pub use firestore_api::FirestoreClient;
