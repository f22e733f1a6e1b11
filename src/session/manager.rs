use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::state::{SessionState, SessionStore};
use super::traits::AuthApi;
use crate::client::ApiError;
use crate::code_input::{CodeInput, VerificationCode, DEFAULT_CODE_LENGTH};
use crate::models::{Credentials, NewUser, User};
use crate::notify::{Notification, Notifier};

/// Owns the session slot and performs every auth operation against it.
///
/// Consumers observe the slot through [`SessionStore`]; only the methods here
/// write to it. Each write bumps a generation counter so that a session check
/// started before a login cannot overwrite that login when it completes late.
pub struct AuthSession<A> {
    api: A,
    tx: watch::Sender<SessionState>,
    generation: AtomicU64,
    notifier: Arc<dyn Notifier>,
}

impl<A: AuthApi> AuthSession<A> {
    /// New manager in the `Loading` state. Call [`AuthSession::refresh`] to
    /// resolve it.
    pub fn new(api: A, notifier: Arc<dyn Notifier>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        Self {
            api,
            tx,
            generation: AtomicU64::new(0),
            notifier,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Read-only handle to the session slot
    pub fn store(&self) -> SessionStore {
        SessionStore::new(self.tx.subscribe())
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Ask the server who is logged in.
    ///
    /// A 401 means `Anonymous` and raises no notification. The result is
    /// dropped if another operation wrote the slot while the check was in
    /// flight.
    pub async fn refresh(&self) -> SessionState {
        let started = self.generation.load(Ordering::SeqCst);
        debug!("Checking current session");

        let next = match self.api.current_user().await {
            Ok(user) => {
                debug!("Session belongs to {}", user.username);
                SessionState::Authenticated(user)
            }
            Err(ApiError::Unauthorized(_)) => {
                debug!("No active session");
                SessionState::Anonymous
            }
            Err(e) => {
                warn!("Session check failed: {}", e);
                SessionState::Error(e.to_string())
            }
        };

        if self.commit_if_unchanged(started, next.clone()) {
            if let SessionState::Error(message) = &next {
                self.notifier
                    .notify(Notification::error("Session check failed", message.clone()));
            }
        } else {
            debug!("Discarding stale session check result");
        }

        self.state()
    }

    /// # Errors
    ///
    /// `AuthenticationFailure` for rejected credentials, otherwise
    /// `NetworkOrServerFailure`. The session is left unchanged on error.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let result = self.api.login(credentials).await;
        self.finish_login(result, "Login failed")
    }

    /// Login against the admin endpoint. The returned user is expected to be
    /// an admin; that is the server's call.
    ///
    /// # Errors
    ///
    /// Same as [`AuthSession::login`].
    pub async fn admin_login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let result = self.api.admin_login(credentials).await;
        let user = self.finish_login(result, "Admin login failed")?;
        if !user.is_admin {
            warn!("Admin login returned non-admin user {}", user.username);
        }
        Ok(user)
    }

    /// Create an account and hold the new, unverified user in the session.
    /// The caller should continue with the verification flow.
    ///
    /// # Errors
    ///
    /// `Rejected` when the server refuses the data (e.g. username taken).
    pub async fn register(&self, user: &NewUser) -> Result<User, AuthError> {
        match self.api.register(user).await {
            Ok(created) => {
                info!("Registered {}", created.username);
                self.commit(SessionState::Authenticated(created.clone()));
                self.notifier.notify(Notification::success(
                    "Registration successful",
                    format!("We sent a verification code to {}.", created.email),
                ));
                Ok(created)
            }
            Err(e) => Err(self.fail("Registration failed", rejected_or_network(e, AuthError::Rejected))),
        }
    }

    /// Ask the server to email a verification code. No session change.
    ///
    /// # Errors
    ///
    /// `Rejected` or `NetworkOrServerFailure`.
    pub async fn request_verification(&self, email: &str) -> Result<(), AuthError> {
        match self.api.request_verification(email).await {
            Ok(()) => {
                self.notifier.notify(Notification::success(
                    "Verification code sent",
                    format!("Check {email} for your code."),
                ));
                Ok(())
            }
            Err(e) => Err(self.fail(
                "Could not send verification code",
                rejected_or_network(e, AuthError::Rejected),
            )),
        }
    }

    /// Ask the server for a fresh code, replacing the previous one.
    ///
    /// # Errors
    ///
    /// `Rejected` or `NetworkOrServerFailure`.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        match self.api.resend_verification(email).await {
            Ok(()) => {
                self.notifier.notify(Notification::success(
                    "Verification code resent",
                    format!("A new code is on its way to {email}."),
                ));
                Ok(())
            }
            Err(e) => Err(self.fail(
                "Could not resend verification code",
                rejected_or_network(e, AuthError::Rejected),
            )),
        }
    }

    /// Confirm the email address; the session user is replaced by the
    /// verified user.
    ///
    /// # Errors
    ///
    /// `VerificationFailure` for a wrong or expired code. The session is left
    /// unchanged on error.
    pub async fn verify_email(&self, email: &str, code: &VerificationCode) -> Result<User, AuthError> {
        match self.api.verify_email(email, code).await {
            Ok(user) => {
                info!("Verified email for {}", user.username);
                self.commit(SessionState::Authenticated(user.clone()));
                self.notifier.notify(Notification::success(
                    "Email verified",
                    "Your account is now active.",
                ));
                Ok(user)
            }
            Err(e) => Err(self.fail(
                "Verification failed",
                rejected_or_network(e, AuthError::VerificationFailure),
            )),
        }
    }

    /// Validate the entered code locally, then verify it.
    ///
    /// # Errors
    ///
    /// `InvalidCode` without contacting the server when the input is
    /// incomplete, otherwise as [`AuthSession::verify_email`].
    pub async fn verify_email_with(&self, email: &str, input: &CodeInput) -> Result<User, AuthError> {
        let code = input.submit().map_err(|e| self.fail("Invalid code", AuthError::from(e)))?;
        self.verify_email(email, &code).await
    }

    /// Validate a code typed as one string, then verify it. The text is
    /// checked as given: nothing is stripped or truncated.
    ///
    /// # Errors
    ///
    /// `InvalidCode` without contacting the server unless `code` is exactly
    /// [`DEFAULT_CODE_LENGTH`] digits, otherwise as
    /// [`AuthSession::verify_email`].
    pub async fn verify_email_code(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let code = VerificationCode::parse(code, DEFAULT_CODE_LENGTH)
            .map_err(|e| self.fail("Invalid code", AuthError::from(e)))?;
        self.verify_email(email, &code).await
    }

    /// End the session. On success the slot is `Anonymous` whatever it held.
    ///
    /// # Errors
    ///
    /// `NetworkOrServerFailure`; the session is left unchanged.
    pub async fn logout(&self) -> Result<(), AuthError> {
        match self.api.logout().await {
            Ok(()) => {
                self.commit(SessionState::Anonymous);
                self.notifier.notify(Notification::success("Logged out", "See you soon."));
                Ok(())
            }
            Err(e) => Err(self.fail("Logout failed", AuthError::NetworkOrServerFailure(e.user_message()))),
        }
    }

    fn finish_login(&self, result: Result<User, ApiError>, failure_title: &str) -> Result<User, AuthError> {
        match result {
            Ok(user) => {
                info!("Logged in as {}", user.username);
                self.commit(SessionState::Authenticated(user.clone()));
                self.notifier.notify(Notification::success(
                    "Logged in",
                    format!("Welcome back, {}!", user.username),
                ));
                Ok(user)
            }
            Err(e) => Err(self.fail(
                failure_title,
                rejected_or_network(e, AuthError::AuthenticationFailure),
            )),
        }
    }

    fn fail(&self, title: &str, error: AuthError) -> AuthError {
        warn!("{}: {}", title, error);
        self.notifier.notify(Notification::error(title, error.user_message()));
        error
    }

    fn commit(&self, next: SessionState) {
        self.tx.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = next;
        });
    }

    fn commit_if_unchanged(&self, started: u64, next: SessionState) -> bool {
        self.tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != started {
                return false;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = next;
            true
        })
    }
}

/// 4xx responses become `rejected(message)`, everything else is a network or
/// server failure.
fn rejected_or_network(error: ApiError, rejected: fn(String) -> AuthError) -> AuthError {
    match error.rejection_message() {
        Some(message) => rejected(message.to_string()),
        None => AuthError::NetworkOrServerFailure(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationQueue, Severity};
    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn user(username: &str, verified: bool) -> User {
        User {
            id: 1,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            middle_name: None,
            phone: None,
            is_admin: false,
            is_verified: verified,
            verification_code: None,
            created_at: Utc::now(),
        }
    }

    fn status(code: u16, message: &str) -> ApiError {
        ApiError::Status {
            status: code,
            message: message.to_string(),
        }
    }

    /// Scripted responses; `None` means "not configured" and yields a 500.
    #[derive(Default)]
    struct FakeApi {
        current: Mutex<Option<Result<User, ApiError>>>,
        login: Mutex<Option<Result<User, ApiError>>>,
        register: Mutex<Option<Result<User, ApiError>>>,
        verify: Mutex<Option<Result<User, ApiError>>>,
        logout: Mutex<Option<Result<(), ApiError>>>,
        verify_calls: Mutex<Vec<String>>,
        hold_current: Option<Arc<Notify>>,
    }

    fn take<T>(slot: &Mutex<Option<Result<T, ApiError>>>) -> Result<T, ApiError> {
        slot.lock().unwrap().take().unwrap_or_else(|| Err(status(500, "unscripted")))
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn current_user(&self) -> Result<User, ApiError> {
            let result = take(&self.current);
            if let Some(gate) = &self.hold_current {
                gate.notified().await;
            }
            result
        }

        async fn login(&self, _credentials: &Credentials) -> Result<User, ApiError> {
            take(&self.login)
        }

        async fn admin_login(&self, _credentials: &Credentials) -> Result<User, ApiError> {
            take(&self.login)
        }

        async fn register(&self, _user: &NewUser) -> Result<User, ApiError> {
            take(&self.register)
        }

        async fn verify_email(&self, email: &str, code: &VerificationCode) -> Result<User, ApiError> {
            self.verify_calls.lock().unwrap().push(format!("{email}:{code}"));
            take(&self.verify)
        }

        async fn request_verification(&self, _email: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn resend_verification(&self, _email: &str) -> Result<(), ApiError> {
            Err(status(429, "Too many requests"))
        }

        async fn logout(&self) -> Result<(), ApiError> {
            take(&self.logout)
        }
    }

    fn session(api: FakeApi) -> (AuthSession<FakeApi>, Arc<NotificationQueue>) {
        let queue = Arc::new(NotificationQueue::new());
        let notifier: Arc<dyn Notifier> = queue.clone();
        (AuthSession::new(api, notifier), queue)
    }

    fn new_user() -> NewUser {
        NewUser {
            username: "alice".to_string(),
            password: SecretString::from("correct horse".to_string()),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            middle_name: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let (session, _) = session(FakeApi::default());
        assert_eq!(session.state(), SessionState::Loading);
    }

    #[tokio::test]
    async fn test_refresh_401_is_anonymous_without_notification() {
        let api = FakeApi {
            current: Mutex::new(Some(Err(ApiError::Unauthorized("Not logged in".to_string())))),
            ..Default::default()
        };
        let (session, queue) = session(api);
        assert_eq!(session.refresh().await, SessionState::Anonymous);
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_error_state_and_notifies() {
        let api = FakeApi {
            current: Mutex::new(Some(Err(status(502, "Bad Gateway")))),
            ..Default::default()
        };
        let (session, queue) = session(api);
        assert!(matches!(session.refresh().await, SessionState::Error(_)));
        let notes = queue.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_refresh_success_is_authenticated() {
        let api = FakeApi {
            current: Mutex::new(Some(Ok(user("bob", true)))),
            ..Default::default()
        };
        let (session, _) = session(api);
        assert_eq!(session.refresh().await.user().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_and_reports() {
        let api = FakeApi {
            current: Mutex::new(Some(Err(ApiError::Unauthorized(String::new())))),
            login: Mutex::new(Some(Err(ApiError::Unauthorized("Invalid username or password".to_string())))),
            ..Default::default()
        };
        let (session, queue) = session(api);
        session.refresh().await;
        queue.drain();

        let err = session.login(&Credentials::new("bob", "nope")).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthenticationFailure("Invalid username or password".to_string())
        );
        assert_eq!(session.state(), SessionState::Anonymous);
        let notes = queue.drain();
        assert_eq!(notes[0].message, "Invalid username or password");
    }

    #[tokio::test]
    async fn test_login_transport_failure_is_network_error() {
        let api = FakeApi {
            login: Mutex::new(Some(Err(status(503, "down")))),
            ..Default::default()
        };
        let (session, _) = session(api);
        let err = session.login(&Credentials::new("bob", "pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkOrServerFailure(_)));
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let mut verified = user("alice", true);
        verified.email = "alice@example.com".to_string();
        let api = FakeApi {
            register: Mutex::new(Some(Ok(user("alice", false)))),
            verify: Mutex::new(Some(Ok(verified))),
            ..Default::default()
        };
        let (session, _) = session(api);

        let created = session.register(&new_user()).await.unwrap();
        assert!(!created.is_verified);
        assert!(session.state().needs_verification());

        let code = VerificationCode::parse("123456", 6).unwrap();
        session.verify_email(&created.email, &code).await.unwrap();
        let state = session.state();
        assert!(state.user().unwrap().is_verified);
        assert!(!state.needs_verification());
    }

    #[tokio::test]
    async fn test_wrong_code_is_verification_failure() {
        let api = FakeApi {
            register: Mutex::new(Some(Ok(user("alice", false)))),
            verify: Mutex::new(Some(Err(status(400, "Invalid or expired code")))),
            ..Default::default()
        };
        let (session, _) = session(api);
        session.register(&new_user()).await.unwrap();

        let code = VerificationCode::parse("000000", 6).unwrap();
        let err = session.verify_email("alice@example.com", &code).await.unwrap_err();
        assert_eq!(err, AuthError::VerificationFailure("Invalid or expired code".to_string()));
        assert!(session.state().needs_verification());
    }

    #[tokio::test]
    async fn test_incomplete_code_is_rejected_locally() {
        let (session, queue) = session(FakeApi::default());
        let mut input = CodeInput::default();
        input.paste(0, "123");

        let err = session.verify_email_with("a@example.com", &input).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode(_)));
        assert!(session.api().verify_calls.lock().unwrap().is_empty());
        assert_eq!(queue.drain()[0].title, "Invalid code");
    }

    #[tokio::test]
    async fn test_malformed_typed_code_is_rejected_locally() {
        let (session, queue) = session(FakeApi::default());

        for code in ["1234567", "12a456", "12345", " 123456"] {
            let err = session.verify_email_code("a@example.com", code).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCode(_)), "{code}: {err:?}");
        }

        assert!(session.api().verify_calls.lock().unwrap().is_empty());
        let notes = queue.drain();
        assert_eq!(notes.len(), 4);
        assert!(notes.iter().all(|n| n.severity == Severity::Error && n.title == "Invalid code"));
        assert_eq!(
            notes[0].message,
            "the code must be exactly 6 digits long, got 7"
        );
    }

    #[tokio::test]
    async fn test_well_formed_typed_code_is_sent_verbatim() {
        let api = FakeApi {
            verify: Mutex::new(Some(Ok(user("alice", true)))),
            ..Default::default()
        };
        let (session, _) = session(api);

        session.verify_email_code("alice@example.com", "012345").await.unwrap();
        assert_eq!(
            *session.api().verify_calls.lock().unwrap(),
            vec!["alice@example.com:012345".to_string()]
        );
    }

    #[tokio::test]
    async fn test_complete_code_input_is_sent() {
        let api = FakeApi {
            verify: Mutex::new(Some(Ok(user("alice", true)))),
            ..Default::default()
        };
        let (session, _) = session(api);
        let mut input = CodeInput::default();
        input.paste(0, "654321");

        session.verify_email_with("alice@example.com", &input).await.unwrap();
        assert_eq!(
            *session.api().verify_calls.lock().unwrap(),
            vec!["alice@example.com:654321".to_string()]
        );
    }

    #[tokio::test]
    async fn test_logout_forces_anonymous_from_error() {
        let api = FakeApi {
            current: Mutex::new(Some(Err(status(500, "boom")))),
            logout: Mutex::new(Some(Ok(()))),
            ..Default::default()
        };
        let (session, _) = session(api);
        session.refresh().await;
        assert!(matches!(session.state(), SessionState::Error(_)));

        session.logout().await.unwrap();
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_user() {
        let api = FakeApi {
            login: Mutex::new(Some(Ok(user("bob", true)))),
            logout: Mutex::new(Some(Err(status(500, "boom")))),
            ..Default::default()
        };
        let (session, _) = session(api);
        session.login(&Credentials::new("bob", "pw")).await.unwrap();
        assert!(session.logout().await.is_err());
        assert!(session.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_verification_requests_only_notify() {
        let (session, queue) = session(FakeApi::default());
        session.request_verification("a@example.com").await.unwrap();
        let err = session.resend_verification("a@example.com").await.unwrap_err();
        assert_eq!(err, AuthError::Rejected("Too many requests".to_string()));
        assert_eq!(session.state(), SessionState::Loading);

        let severities: Vec<Severity> = queue.drain().iter().map(|n| n.severity).collect();
        assert_eq!(severities, vec![Severity::Success, Severity::Error]);
    }

    #[tokio::test]
    async fn test_stale_session_check_does_not_overwrite_login() {
        let gate = Arc::new(Notify::new());
        let api = FakeApi {
            current: Mutex::new(Some(Err(ApiError::Unauthorized(String::new())))),
            login: Mutex::new(Some(Ok(user("bob", true)))),
            hold_current: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let (session, _) = session(api);
        let session = Arc::new(session);

        let check = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.refresh().await })
        };
        while session.api().current.lock().unwrap().is_some() {
            tokio::task::yield_now().await;
        }

        session.login(&Credentials::new("bob", "pw")).await.unwrap();
        gate.notify_one();
        check.await.unwrap();

        assert_eq!(session.state().user().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn test_store_observes_writes() {
        let api = FakeApi {
            login: Mutex::new(Some(Ok(user("bob", true)))),
            ..Default::default()
        };
        let (session, _) = session(api);
        let mut store = session.store();
        assert_eq!(store.current(), SessionState::Loading);

        session.login(&Credentials::new("bob", "pw")).await.unwrap();
        let next = store.changed().await.unwrap();
        assert!(next.is_authenticated());
        assert_eq!(store.user().unwrap().username, "bob");
    }
}
