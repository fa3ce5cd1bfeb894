//! Observability setup for the build relay: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
