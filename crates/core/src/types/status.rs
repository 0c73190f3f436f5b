//! Order lifecycle status.
//!
//! ```text
//! placed ──► accepted ──► on_the_way ──► delivered
//!    │           │             │
//!    └───────────┴─────────────┴───────► cancelled
//! ```
//!
//! Progress is monotonic: an order may skip forward (the ETA clock moves a
//! `placed` order straight to `delivered`) but never moves back. `delivered`
//! and `cancelled` are terminal.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by status parsing and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The requested move is not allowed by the lifecycle.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
    /// Unknown status string.
    #[error("unknown order status: {0}")]
    Unknown(String),
}

/// Where an order is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Accepted,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Placed,
        Self::Accepted,
        Self::OnTheWay,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along the delivery path. Cancellation sits outside it.
    const fn progress(self) -> Option<u8> {
        match self {
            Self::Placed => Some(0),
            Self::Accepted => Some(1),
            Self::OnTheWay => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    /// Whether `self -> next` is a legal lifecycle move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.progress(), next.progress()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Validate a move and return the new status.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] for backwards moves, no-op
    /// moves, and any move out of a terminal status.
    pub const fn transition_to(self, next: Self) -> Result<Self, StatusError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Wire name (`on_the_way`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Accepted => "accepted",
            Self::OnTheWay => "on_the_way",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human readable label shown on the tracker and order history.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Placed => "Order Placed",
            Self::Accepted => "Accepted",
            Self::OnTheWay => "On the Way",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::Unknown(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use OrderStatus::{Accepted, Cancelled, Delivered, OnTheWay, Placed};

    #[test]
    fn test_forward_moves_are_legal() {
        assert!(Placed.can_transition_to(Accepted));
        assert!(Placed.can_transition_to(OnTheWay));
        assert!(Placed.can_transition_to(Delivered));
        assert!(Accepted.can_transition_to(OnTheWay));
        assert!(Accepted.can_transition_to(Delivered));
        assert!(OnTheWay.can_transition_to(Delivered));
    }

    #[test]
    fn test_any_live_order_can_be_cancelled() {
        for status in [Placed, Accepted, OnTheWay] {
            assert_eq!(status.transition_to(Cancelled), Ok(Cancelled));
        }
    }

    #[test]
    fn test_backwards_and_noop_moves_are_rejected() {
        assert!(!Accepted.can_transition_to(Placed));
        assert!(!OnTheWay.can_transition_to(Accepted));
        assert!(!Placed.can_transition_to(Placed));
    }

    #[test]
    fn test_terminal_statuses_never_move() {
        for terminal in [Delivered, Cancelled] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert!(
                    terminal.transition_to(next).is_err(),
                    "{terminal} -> {next} should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_value(status).ok();
            assert_eq!(json, Some(serde_json::Value::from(status.as_str())));
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(OnTheWay.label(), "On the Way");
        assert_eq!(Placed.label(), "Order Placed");
    }
}
