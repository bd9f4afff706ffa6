//! Request authorizer for execute-api style gateways.
//!
//! Each request carries a client id header and a bearer access token. The
//! token is verified against a secret derived from a process-wide salt and the
//! client id; on success the authorizer compiles a minimal policy document
//! scoped to the called API and stage.
//!
//! ```no_run
//! use portcullis::{
//!     authz::{Authorizer, AuthorizerRequest},
//!     config::AuthorizerConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorizerConfig::from_file("portcullis.toml")?;
//! let authorizer = Authorizer::from_config(&config);
//! let request: AuthorizerRequest = serde_json::from_str(&std::fs::read_to_string("event.json")?)?;
//! let decision = authorizer.decide(&request).await?;
//! println!("{}", serde_json::to_string_pretty(&decision)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod authz;
pub mod config;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;

pub use routes::{AppState, build_app};
