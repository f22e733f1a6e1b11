//! HTTP client for the marketplace API.
//!
//! Keeps a cookie store so the session cookie issued on login or
//! registration rides along with every later request.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::code_input::VerificationCode;
use crate::config::ClientConfig;
use crate::filters::FilterCriteria;
use crate::listings::{listings_path, ListingSource};
use crate::models::{Credentials, NewProperty, NewUser, Property, User};
use crate::session::AuthApi;

/// Errors that can occur when talking to the marketplace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 401: there is no logged-in session.
    #[error("not authenticated: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Transport failure, timeout or undecodable body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Server message for 4xx responses, where the request itself was refused
    /// (bad credentials, wrong code, taken username).
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(message) => Some(message),
            Self::Status { status, message } if (400..500).contains(status) => Some(message),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self.rejection_message() {
            Some(message) => message.to_string(),
            None => self.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct FavoriteToggle {
    favorited: bool,
}

/// Marketplace API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new client from configuration
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Single listing by id.
    pub async fn listing(&self, id: i64) -> Result<Property, ApiError> {
        self.get_json(&format!("/api/listings/{id}")).await
    }

    /// Submit a new listing; it stays hidden until an admin approves it.
    pub async fn create_listing(&self, listing: &NewProperty) -> Result<Property, ApiError> {
        self.post_json("/api/listings", listing).await
    }

    /// Listings owned by the logged-in user, approved or not.
    pub async fn my_listings(&self) -> Result<Vec<Property>, ApiError> {
        self.get_json("/api/user/listings").await
    }

    pub async fn favorites(&self) -> Result<Vec<Property>, ApiError> {
        self.get_json("/api/favorites").await
    }

    /// Add or remove a favorite. Returns whether the listing is now a favorite.
    pub async fn toggle_favorite(&self, property_id: i64) -> Result<bool, ApiError> {
        let path = format!("/api/favorites/{property_id}");
        let response = self.send(self.request(Method::POST, &path)?).await?;
        let toggle: FavoriteToggle = response.json().await?;
        Ok(toggle.favorited)
    }

    /// Listings awaiting moderation (admin only).
    pub async fn pending_listings(&self) -> Result<Vec<Property>, ApiError> {
        self.get_json("/api/admin/listings/pending").await
    }

    /// Approve a listing for public search (admin only).
    pub async fn approve_listing(&self, id: i64) -> Result<Property, ApiError> {
        let path = format!("/api/admin/listings/{id}/approve");
        let response = self.send(self.request(Method::POST, &path)?).await?;
        Ok(response.json().await?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base_url.join(path)?;
        Ok(self.client.request(method, url))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path)?.json(body)).await?;
        Ok(response.json().await?)
    }

    async fn post_ignoring_body(&self, path: &str, body: Option<&serde_json::Value>) -> Result<(), ApiError> {
        let mut request = self.request(Method::POST, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(message));
        }

        warn!("API returned status {}: {}", status, message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// `{"message": ...}` bodies yield their message, other non-blank bodies are
/// used verbatim.
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return Some(parsed.message);
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl ListingSource for ApiClient {
    async fn fetch_listings(&self, filters: &FilterCriteria) -> anyhow::Result<Vec<Property>> {
        let listings: Vec<Property> = self
            .get_json(&listings_path(filters))
            .await
            .context("Failed to fetch listings")?;
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        "Marketplace API"
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.get_json("/api/user").await
    }

    async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        self.post_json("/api/login", credentials).await
    }

    async fn admin_login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        self.post_json("/api/admin/login", credentials).await
    }

    async fn register(&self, user: &NewUser) -> Result<User, ApiError> {
        self.post_json("/api/register", user).await
    }

    async fn verify_email(&self, email: &str, code: &VerificationCode) -> Result<User, ApiError> {
        self.post_json("/api/verify-email", &json!({ "email": email, "code": code.as_str() }))
            .await
    }

    async fn request_verification(&self, email: &str) -> Result<(), ApiError> {
        self.post_ignoring_body("/api/request-verification", Some(&json!({ "email": email })))
            .await
    }

    async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        self.post_ignoring_body("/api/resend-verification", Some(&json!({ "email": email })))
            .await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.post_ignoring_body("/api/logout", None).await
    }
}
