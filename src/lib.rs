//! Chirpy session core: password login, access tokens and refresh-token
//! sessions.
//!
//! `session::SessionService` is the entry point; the HTTP layer maps
//! `errors::AppError` to responses.

pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod session;
pub mod store;
