//! The relay pipeline: stage, dispatch, correlate, project.
//!
//! [`service::BuildRelay`] is the entry point; the other modules are its
//! stages and are public so they can be tested and reused on their own.

pub mod correlator;
pub mod dispatcher;
pub mod projector;
pub mod service;
pub mod stager;
