//! Client core of a real-estate listing marketplace: email-verified
//! authentication, listing search with filters and client-side sorting, and
//! verification code entry.

pub mod client;
pub mod code_input;
pub mod config;
pub mod filters;
pub mod listings;
pub mod models;
pub mod notify;
pub mod session;

pub use client::{ApiClient, ApiError};
pub use code_input::{CodeInput, VerificationCode};
pub use config::ClientConfig;
pub use filters::{FilterCriteria, FilterField, FilterState};
pub use listings::{ListingBrowser, ListingSource, ListingsView, SortKey};
pub use session::{AuthError, AuthSession, SessionState, SessionStore};
