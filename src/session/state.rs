use tokio::sync::watch;

use crate::models::User;

/// Contents of the session slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// The initial "who am I" check has not completed yet.
    Loading,
    /// No one is logged in.
    Anonymous,
    Authenticated(User),
    /// The session check failed for a reason other than "not logged in".
    Error(String),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Logged in but the email address is not confirmed yet.
    pub fn needs_verification(&self) -> bool {
        self.user().is_some_and(|user| !user.is_verified)
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|user| user.is_admin)
    }
}

/// Read-only view of the session slot. Cheap to clone; hand one to every
/// consumer that needs to observe the current user.
#[derive(Debug, Clone)]
pub struct SessionStore {
    rx: watch::Receiver<SessionState>,
}

impl SessionStore {
    pub(super) fn new(rx: watch::Receiver<SessionState>) -> Self {
        Self { rx }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.rx.borrow().user().cloned()
    }

    /// Wait for the next write to the slot and return the new state.
    ///
    /// Returns `None` once the owning session manager has been dropped.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
