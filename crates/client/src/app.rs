//! Composition root for the client.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use pizza_time_core::Email;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, Remote, SupportEmail};
use crate::cart::Cart;
use crate::chat::ChatAssistant;
use crate::checkout::{PaymentDetails, Receipt, checkout};
use crate::config::ClientConfig;
use crate::contacts::ContactRoster;
use crate::error::{CheckoutError, ClientError, Result};
use crate::lock::PinLock;
use crate::orders::OrderTracker;
use crate::session::Session;
use crate::storage::{DirStorage, LocalStore, MemoryStorage, Storage};
use crate::sweep::EtaSweep;

const DEFAULT_SUPPORT_SUBJECT: &str = "Support Request";

/// Every client aggregate, wired to one store and one gateway.
pub struct PizzaApp {
    config: ClientConfig,
    store: LocalStore,
    remote: Arc<dyn Remote>,
    cart: Cart,
    orders: Arc<OrderTracker>,
    contacts: ContactRoster,
    session: Session,
    chat: ChatAssistant,
    pin: PinLock,
}

impl PizzaApp {
    /// Open storage and connect to the gateway described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> = match &config.storage_dir {
            Some(dir) => Arc::new(DirStorage::open(dir)?),
            None => Arc::new(MemoryStorage::new()),
        };
        let store = LocalStore::new(storage);
        let remote = Arc::new(ApiClient::new(&config, store.clone())?);
        info!(
            api_url = %config.api_url,
            use_backend = config.use_backend,
            persistent = config.storage_dir.is_some(),
            "client initialized"
        );
        Ok(Self::with_remote(config, store, remote, Arc::new(DefaultClock)))
    }

    /// Wire the aggregates around an existing store, gateway and clock.
    pub fn with_remote(
        config: ClientConfig,
        store: LocalStore,
        remote: Arc<dyn Remote>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cart: Cart::load(store.clone()),
            orders: Arc::new(OrderTracker::new(
                Arc::clone(&remote),
                store.clone(),
                clock,
            )),
            contacts: ContactRoster::new(Arc::clone(&remote), store.clone()),
            session: Session::new(Arc::clone(&remote), store.clone()),
            chat: ChatAssistant::new(Arc::clone(&remote)),
            pin: PinLock::new(store.clone()),
            config,
            store,
            remote,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn orders(&self) -> &OrderTracker {
        &self.orders
    }

    #[must_use]
    pub const fn contacts(&self) -> &ContactRoster {
        &self.contacts
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn chat(&self) -> &ChatAssistant {
        &self.chat
    }

    #[must_use]
    pub const fn pin(&self) -> &PinLock {
        &self.pin
    }

    /// Revalidate the session and, when signed in, pull orders and contacts.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        if self.session.restore().await?.is_none() {
            return Ok(());
        }
        self.orders.refresh().await?;
        self.contacts.load().await?;
        Ok(())
    }

    /// Pay for the cart and turn it into orders.
    ///
    /// # Errors
    ///
    /// See [`checkout`].
    pub async fn checkout(
        &self,
        instructions: &str,
        payment: &PaymentDetails,
    ) -> std::result::Result<Receipt, CheckoutError> {
        checkout(&self.cart, &self.orders, instructions, payment).await
    }

    /// Send a message to support. Name, email and message are required.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a missing field or malformed
    /// address, otherwise the gateway's error.
    #[instrument(skip_all)]
    pub async fn send_support_email(&self, mut email: SupportEmail) -> Result<()> {
        if email.name.trim().is_empty()
            || email.email.trim().is_empty()
            || email.message.trim().is_empty()
        {
            return Err(ClientError::Validation(
                "Please fill in all required fields".to_owned(),
            ));
        }
        Email::parse(email.email.trim()).map_err(|_| {
            ClientError::Validation("Please enter a valid email address".to_owned())
        })?;
        if email.subject.as_deref().is_none_or(|s| s.trim().is_empty()) {
            email.subject = Some(DEFAULT_SUPPORT_SUBJECT.to_owned());
        }
        self.remote.send_support_email(&email).await
    }

    /// Delete the account, then drop every local trace of it.
    ///
    /// # Errors
    ///
    /// See [`Session::delete_account`]. Local state is kept when it fails.
    pub async fn delete_account(&self, password: &str) -> Result<()> {
        self.session.delete_account(password).await?;
        self.orders.forget();
        self.contacts.forget();
        self.cart.clear();
        if let Err(e) = self.pin.clear() {
            warn!(error = %e, "failed to clear PIN after account deletion");
        }
        Ok(())
    }

    /// Start the ETA sweep at the configured interval.
    #[must_use]
    pub fn start_sweep(&self) -> EtaSweep {
        EtaSweep::start(Arc::clone(&self.orders), self.config.sweep_interval)
    }
}

impl std::fmt::Debug for PizzaApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PizzaApp")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizza_time_core::{Credentials, NewContact, Price};

    use super::*;
    use crate::cart::CartProduct;
    use crate::test_support::{FakeRemote, MutableClock};

    fn app(remote: Arc<FakeRemote>) -> PizzaApp {
        PizzaApp::with_remote(
            ClientConfig::default(),
            LocalStore::in_memory(),
            remote,
            MutableClock::at_millis(1_700_000_000_000),
        )
    }

    fn card() -> PaymentDetails {
        PaymentDetails {
            card_number: "4242424242424242".to_owned(),
            expiry: "01/30".to_owned(),
            cvv: "999".to_owned(),
            cardholder_name: "Ana Diaz".to_owned(),
            billing_address: None,
        }
    }

    #[test]
    fn test_new_with_storage_dir_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::offline().with_storage_dir(dir.path());
        let app = PizzaApp::new(config.clone()).unwrap();
        app.cart()
            .add_to_cart(CartProduct::new("a", "A", Price::from_cents(800)));
        app.pin().set_pin("2468").unwrap();

        let reopened = PizzaApp::new(config).unwrap();
        assert_eq!(reopened.cart().item_count(), 1);
        assert!(reopened.pin().verify("2468"));
    }

    #[tokio::test]
    async fn test_checkout_through_app() {
        let remote = FakeRemote::online();
        let app = app(remote.clone());
        app.cart()
            .add_to_cart(CartProduct::new("a", "A", Price::from_cents(800)));

        let receipt = app.checkout("", &card()).await.unwrap();
        assert_eq!(receipt.orders.len(), 1);
        assert_eq!(app.orders().orders().len(), 1);
        assert_eq!(remote.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_support_email_validation_and_default_subject() {
        let remote = FakeRemote::online();
        let app = app(remote.clone());

        let mut email = SupportEmail {
            name: "Ana".to_owned(),
            email: "ana@example".to_owned(),
            subject: None,
            message: "Where is my pizza?".to_owned(),
        };
        let err = app.send_support_email(email.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid email address");

        email.email = "ana@example.com".to_owned();
        app.send_support_email(email).await.unwrap();
        let sent = remote.emails();
        assert_eq!(sent.first().unwrap().subject.as_deref(), Some("Support Request"));
    }

    #[tokio::test]
    async fn test_delete_account_forgets_local_state() {
        let remote = FakeRemote::online();
        let app = app(remote.clone());
        app.session()
            .register(Credentials {
                username: "ana".to_owned(),
                email: None,
                password: "Secret123".to_owned(),
            })
            .await
            .unwrap();
        app.contacts()
            .add(NewContact {
                name: "Mom".to_owned(),
                phone: "555-0101".to_owned(),
                is_primary: true,
            })
            .await
            .unwrap();

        app.delete_account("Secret123").await.unwrap();
        assert!(!app.session().is_authenticated());
        assert!(app.contacts().contacts().is_empty());
        assert!(remote.contacts().is_empty());
    }

    #[tokio::test]
    async fn test_sync_skips_when_signed_out() {
        let remote = FakeRemote::online();
        let app = app(remote);
        app.sync().await.unwrap();
        assert!(app.orders().orders().is_empty());
    }
}
