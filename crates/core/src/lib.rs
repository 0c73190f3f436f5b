//! Pizza Time Core - Shared domain types.
//!
//! This crate provides the types shared by every Pizza Time component:
//! - `server` - HTTP gateway and document persistence
//! - `client` - Local-first client state (cart, orders, contacts)
//! - `cli` - Operational commands for the document store
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The order lifecycle rules live here so that the
//! server and the client agree on them.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, statuses and timestamps
//! - [`order`] - Orders, product snapshots and the ETA auto-delivery derivation
//! - [`contact`] - Emergency contacts
//! - [`account`] - Public account projection
//! - [`envelope`] - The JSON response envelope shared by every endpoint
//! - [`chat`] - Support chat turns

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod chat;
pub mod contact;
pub mod envelope;
pub mod order;
pub mod types;

pub use account::{AuthResponse, Credentials, PasswordConfirmation, PublicUser};
pub use chat::{ChatReply, ChatRequest, ChatRole, ChatTurn};
pub use contact::{Contact, ContactPatch, NewContact};
pub use envelope::ApiResponse;
pub use order::{
    DEFAULT_COURIER_NAME, DEFAULT_ETA_MINUTES, NewOrder, Order, OrderPatch, ProductSnapshot,
    sort_most_recent_first, total_spent,
};
pub use types::*;
