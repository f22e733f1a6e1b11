use async_trait::async_trait;

use crate::client::ApiError;
use crate::code_input::VerificationCode;
use crate::models::{Credentials, NewUser, User};

/// Request/response exchanges with the auth endpoints.
/// [`AuthSession`](super::AuthSession) depends only on this.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// "Who am I": the user behind the current session cookie
    async fn current_user(&self) -> Result<User, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<User, ApiError>;

    async fn admin_login(&self, credentials: &Credentials) -> Result<User, ApiError>;

    /// Create an account; the returned user is not yet verified
    async fn register(&self, user: &NewUser) -> Result<User, ApiError>;

    async fn verify_email(&self, email: &str, code: &VerificationCode) -> Result<User, ApiError>;

    async fn request_verification(&self, email: &str) -> Result<(), ApiError>;

    async fn resend_verification(&self, email: &str) -> Result<(), ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;
}
