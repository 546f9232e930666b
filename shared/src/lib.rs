//! Platform-neutral core of the TravelMate mobile client.
//!
//! The native shell constructs a [`TravelClient`] from a [`ClientConfig`] and
//! calls the repositories it exposes. Session state lives in one
//! [`SessionStore`]; every authorised request goes through the
//! [`RequestDispatcher`], which refreshes an expired access token once and
//! retries.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod models;
pub mod repositories;
pub mod session;
pub mod transport;

pub use api::ApiClient;
pub use cache::DetailCache;
pub use client::TravelClient;
pub use config::ClientConfig;
pub use dispatcher::RequestDispatcher;
pub use envelope::Page;
pub use error::{AppError, AppResult, ErrorKind};
pub use session::{
    AccessToken, Credential, RefreshToken, SessionSnapshot, SessionStatus, SessionStore,
    TokenPair, TokenRefresher,
};
