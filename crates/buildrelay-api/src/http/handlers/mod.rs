//! HTTP request handlers for the REST API.

pub mod build;
pub mod callback;
pub mod health;
pub mod status;
