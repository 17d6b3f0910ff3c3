//! Token acquisition: identity REST sign-in/refresh and the external
//! credential helper.

pub mod claims;
mod endpoints;
pub mod helper;
pub mod service;

pub use service::TokenAcquirer;
