//! HireHiker Web - REST API
//!
//! This crate provides the HTTP surface used by the candidate and recruiter UIs:
//! - Problem management and GitHub import
//! - Session lifecycle and the assistant chat
//! - Transcript analysis and the recruiter dashboard

pub mod api;

pub use api::{create_api_router, create_router, ApiError, AppState};
