//! Pizza Time Client - Local-first client state.
//!
//! Holds everything the customer-facing app keeps between screens: the cart,
//! placed orders, emergency contacts, the signed-in session, the support chat
//! and the unlock PIN. Each aggregate writes through to the gateway when it
//! can and keeps working from local storage when it cannot.
//!
//! # Modules
//!
//! - [`api`] - The [`Remote`] port and its HTTP implementation
//! - [`storage`] - Key-value persistence (directory or memory)
//! - [`observable`] - Current value plus change listeners
//! - [`fallback`] - Remote-first calls with a local fallback
//! - [`cart`] - Cart lines and delivery preference
//! - [`orders`] - Order tracking and the ETA-driven lifecycle
//! - [`contacts`] - Emergency contacts
//! - [`checkout`] - Mock payment and cart-to-orders conversion
//! - [`session`], [`chat`], [`lock`] - Account, support chat and unlock PIN
//! - [`sweep`] - Background ETA sweep
//! - [`app`] - [`PizzaApp`], which wires the above together
//!
//! # Example
//!
//! ```no_run
//! use pizza_time_client::{ClientConfig, PizzaApp};
//!
//! # async fn run() -> Result<(), pizza_time_client::ClientError> {
//! let app = PizzaApp::new(ClientConfig::default().with_storage_dir(".pizza-time"))?;
//! let _sweep = app.start_sweep();
//! app.sync().await?;
//! println!("{} items in the cart", app.cart().item_count());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod app;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod config;
pub mod contacts;
pub mod error;
pub mod fallback;
pub mod lock;
pub mod observable;
pub mod orders;
pub mod session;
pub mod storage;
pub mod sweep;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, Remote, SupportEmail};
pub use app::PizzaApp;
pub use cart::{
    Address, Cart, CartItem, CartProduct, Customization, DeliveryType, MAX_LINE_QUANTITY,
};
pub use chat::ChatAssistant;
pub use checkout::{PaymentDetails, Receipt, checkout};
pub use config::ClientConfig;
pub use contacts::ContactRoster;
pub use error::{CheckoutError, ClientError, StorageError};
pub use fallback::{Synced, remote_or_local};
pub use lock::PinLock;
pub use observable::{Observable, Subscription};
pub use orders::OrderTracker;
pub use session::Session;
pub use storage::{DirStorage, LocalStore, MemoryStorage, Storage};
pub use sweep::EtaSweep;
