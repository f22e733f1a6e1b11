//! Authentication session: a single slot holding the current user, written
//! only by the outcomes of the auth operations.

mod error;
mod manager;
mod state;
mod traits;

pub use error::AuthError;
pub use manager::AuthSession;
pub use state::{SessionState, SessionStore};
pub use traits::AuthApi;
