//! HTTP/REST API layer.
//!
//! Axum routes under `/api/` for submission, status polling and push
//! callbacks, plus `/health`.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
