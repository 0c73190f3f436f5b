//! Error types for the client crate.

use pizza_time_core::{OrderId, StatusError};
use thiserror::Error;

/// Local persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the client aggregates and the gateway client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway answered with a failure envelope or a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The gateway could not be reached.
    #[error("Network error. Please check your connection.")]
    Network(#[source] reqwest::Error),

    /// The gateway answered with a body that is not the expected JSON.
    #[error("Unexpected response from server")]
    Decode(#[source] reqwest::Error),

    /// The remote backend is switched off in the client configuration.
    #[error("Backend disabled")]
    Offline,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// Whether the failure came from the remote side (so a local fallback is appropriate).
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::Network(_) | Self::Decode(_) | Self::Offline
        )
    }

    /// HTTP status of a gateway failure.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why a checkout stopped.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,

    #[error("Invalid payment details: {0}")]
    InvalidPayment(&'static str),

    /// Some units were converted into orders before a failure.
    ///
    /// The converted units have already been removed from the cart.
    #[error("Placed {} of {requested} orders: {source}", placed.len())]
    Partial {
        placed: Vec<OrderId>,
        requested: u32,
        #[source]
        source: ClientError,
    },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        assert!(
            ClientError::Api {
                status: 500,
                message: "boom".to_owned()
            }
            .is_remote()
        );
        assert!(ClientError::Offline.is_remote());
        assert!(!ClientError::NotFound("Order".to_owned()).is_remote());
        assert!(!ClientError::Validation("x".to_owned()).is_remote());
    }

    #[test]
    fn test_partial_checkout_message() {
        let err = CheckoutError::Partial {
            placed: vec![OrderId::new("a"), OrderId::new("b")],
            requested: 3,
            source: ClientError::Offline,
        };
        assert_eq!(err.to_string(), "Placed 2 of 3 orders: Backend disabled");
    }
}
