pub mod refresh_actor;
pub mod session;

pub use refresh_actor::{RefreshHandle, RefreshStatus, refresh_delay};
pub use session::AuthSession;
