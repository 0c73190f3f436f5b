//! Core types for Pizza Time.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod timestamp;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use status::*;
pub use timestamp::EpochMillis;
