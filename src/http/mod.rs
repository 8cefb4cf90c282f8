//! Authenticated HTTP plumbing: request decoration, busy tracking and
//! centralized failure dispatch.

mod client;
mod error;

pub use client::ApiClient;
pub use error::{ApiError, classify, classify_status};
