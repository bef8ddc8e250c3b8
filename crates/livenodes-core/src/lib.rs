//! livenodes core - Endpoint, configuration and error types shared by the balancer

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
