//! Error types for livenodes

use thiserror::Error;

/// Why a single discovery attempt produced no usable node list
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DiscoveryFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("response is not a JSON list")]
    NotAList,

    #[error("response contained no usable nodes")]
    EmptyList,
}

/// Main error type for livenodes
#[derive(Error, Debug)]
pub enum LbError {
    #[error("discovery via {contact} failed: {reason}")]
    DiscoveryFailed {
        contact: String,
        reason: DiscoveryFailure,
    },

    #[error("membership list cannot be empty")]
    EmptyMembership,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no nodes match rack {rack:?} / datacenter {datacenter:?}")]
    RackOrDatacenterMismatch {
        rack: Option<String>,
        datacenter: Option<String>,
    },

    #[error("transport setup failed: {0}")]
    Transport(String),
}

impl LbError {
    pub fn discovery(contact: impl ToString, reason: DiscoveryFailure) -> Self {
        Self::DiscoveryFailed {
            contact: contact.to_string(),
            reason,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailed {
                reason: DiscoveryFailure::Transport(_) | DiscoveryFailure::Status(_),
                ..
            }
        )
    }

    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::DiscoveryFailed { .. })
    }
}

/// Result type alias for livenodes
pub type Result<T> = std::result::Result<T, LbError>;
