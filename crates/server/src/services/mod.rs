//! Business logic services.
//!
//! - `auth` - accounts, password hashing and bearer tokens
//! - `chat` - support chat proxy to the generative model
//! - `email` - support contact form intake

pub mod auth;
pub mod chat;
pub mod email;
