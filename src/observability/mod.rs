//! Structured logging for the authorizer host.

mod tracing_init;

pub use tracing_init::*;
