//! Shopping cart and delivery preference.
//!
//! Lines are keyed by an identity derived from the pizza and its
//! customization, so adding the same configured pizza twice bumps the
//! quantity instead of creating a second line. Every mutation is persisted
//! and published to subscribers.

use std::fmt::Write as _;

use pizza_time_core::Price;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::observable::{Observable, Subscription};
use crate::storage::{CART_KEY, DELIVERY_KEY, LocalStore};

/// Bytes of the customization digest kept in a line identity.
const DIGEST_BYTES: usize = 6;

/// Most units a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Options chosen in the pizza builder.
///
/// Field order is part of the line identity: the digest is taken over the
/// JSON encoding, which follows declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crust: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sauce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheese: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toppings: Option<Vec<String>>,
}

impl Customization {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.crust.is_none()
            && self.sauce.is_none()
            && self.cheese.is_none()
            && self.toppings.is_none()
    }
}

/// What the menu hands to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub pizza_id: String,
    pub pizza_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_image: Option<String>,
    pub pizza_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CartProduct {
    /// A plain, uncustomized pizza.
    pub fn new(pizza_id: impl Into<String>, pizza_name: impl Into<String>, price: Price) -> Self {
        Self {
            pizza_id: pizza_id.into(),
            pizza_name: pizza_name.into(),
            pizza_image: None,
            pizza_price: price,
            customization: None,
            note: None,
        }
    }

    #[must_use]
    pub fn with_customization(mut self, customization: Customization) -> Self {
        self.customization = Some(customization);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Identity of the line this product lands on.
    #[must_use]
    pub fn line_id(&self) -> String {
        line_identity(&self.pizza_id, self.customization.as_ref())
    }
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub pizza_id: String,
    pub pizza_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_image: Option<String>,
    pub pizza_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.pizza_price.times(self.quantity)
    }
}

/// `pizzaId` for plain pizzas, `pizzaId_<digest>` for customized ones.
#[must_use]
pub fn line_identity(pizza_id: &str, customization: Option<&Customization>) -> String {
    let Some(customization) = customization.filter(|c| !c.is_empty()) else {
        return pizza_id.to_owned();
    };
    // Serializing a struct of strings cannot fail.
    let encoded = serde_json::to_vec(customization).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    let mut id = format!("{pizza_id}_");
    for byte in digest.iter().take(DIGEST_BYTES) {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Pick-up or delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Carry,
    #[default]
    Delivery,
}

impl DeliveryType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Carry => "Carry",
            Self::Delivery => "Delivery",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

impl Address {
    /// Non-empty parts joined with `, `.
    #[must_use]
    pub fn one_line(&self) -> String {
        [&self.street, &self.city, &self.state, &self.zip_code]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryPreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delivery_type: Option<DeliveryType>,
}

/// The cart aggregate.
pub struct Cart {
    store: LocalStore,
    items: Observable<Vec<CartItem>>,
    delivery: Observable<DeliveryPreference>,
}

impl Cart {
    /// Restore the cart from `store`.
    #[must_use]
    pub fn load(store: LocalStore) -> Self {
        let items = store.load::<Vec<CartItem>>(CART_KEY).unwrap_or_default();
        let delivery = store
            .load::<DeliveryPreference>(DELIVERY_KEY)
            .unwrap_or_default();
        Self {
            store,
            items: Observable::new(
                items
                    .into_iter()
                    .filter(|line| line.quantity > 0)
                    .map(|mut line| {
                        line.quantity = line.quantity.min(MAX_LINE_QUANTITY);
                        line
                    })
                    .collect(),
            ),
            delivery: Observable::new(delivery),
        }
    }

    /// Edit the lines under the lock, persist best-effort, then publish.
    fn commit<R>(&self, edit: impl FnOnce(&mut Vec<CartItem>) -> R) -> R {
        self.items.update(|items| {
            let result = edit(items);
            if let Err(e) = self.store.save(CART_KEY, items) {
                warn!(error = %e, "failed to persist cart");
            }
            result
        })
    }

    /// Add one unit of `product`, merging into an existing identical line.
    ///
    /// A line already holding [`MAX_LINE_QUANTITY`] units stays there.
    pub fn add_to_cart(&self, product: CartProduct) {
        let id = product.line_id();
        self.commit(|items| {
            if let Some(line) = items.iter_mut().find(|line| line.id == id) {
                line.quantity = line.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
            } else {
                items.push(CartItem {
                    id,
                    pizza_id: product.pizza_id,
                    pizza_name: product.pizza_name,
                    pizza_image: product.pizza_image,
                    pizza_price: product.pizza_price,
                    customization: product.customization,
                    note: product.note,
                    quantity: 1,
                });
            }
        });
    }

    pub fn remove_from_cart(&self, id: &str) {
        self.commit(|items| items.retain(|line| line.id != id));
    }

    /// Set a line's quantity. Zero or less removes the line; anything above
    /// [`MAX_LINE_QUANTITY`] is capped.
    pub fn update_quantity(&self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_from_cart(id);
            return;
        }
        let quantity = u32::try_from(quantity)
            .unwrap_or(MAX_LINE_QUANTITY)
            .min(MAX_LINE_QUANTITY);
        self.commit(|items| {
            if let Some(line) = items.iter_mut().find(|line| line.id == id) {
                line.quantity = quantity;
            }
        });
    }

    /// Take `units` off a line, dropping it when nothing is left.
    pub(crate) fn deduct(&self, id: &str, units: u32) {
        self.commit(|items| {
            if let Some(line) = items.iter_mut().find(|line| line.id == id) {
                line.quantity = line.quantity.saturating_sub(units);
            }
            items.retain(|line| line.quantity > 0);
        });
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.items.get()
    }

    /// Sum of price times quantity.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.get().iter().map(CartItem::subtotal).sum()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .get()
            .iter()
            .fold(0, |count: u32, line| count.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.get().is_empty()
    }

    /// Empty the cart and forget the persisted copy.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(CART_KEY) {
            warn!(error = %e, "failed to remove persisted cart");
        }
        self.items.update(Vec::clear);
    }

    /// Observe the cart lines.
    pub fn subscribe(&self, listener: impl Fn(&Vec<CartItem>) + Send + Sync + 'static) -> Subscription {
        self.items.subscribe(listener)
    }

    fn commit_delivery(&self, edit: impl FnOnce(&mut DeliveryPreference)) {
        self.delivery.update(|preference| {
            edit(preference);
            if let Err(e) = self.store.save(DELIVERY_KEY, preference) {
                warn!(error = %e, "failed to persist delivery preference");
            }
        });
    }

    pub fn set_address(&self, address: Address) {
        self.commit_delivery(|preference| preference.address = Some(address));
    }

    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.delivery.get().address
    }

    pub fn set_delivery_type(&self, delivery_type: DeliveryType) {
        self.commit_delivery(|preference| preference.delivery_type = Some(delivery_type));
    }

    #[must_use]
    pub fn delivery_type(&self) -> Option<DeliveryType> {
        self.delivery.get().delivery_type
    }

    /// `Delivery: 1 Main St, Dallas, TX, 75001`, or `None` without an address.
    #[must_use]
    pub fn address_summary(&self) -> Option<String> {
        let preference = self.delivery.get();
        let line = preference.address.as_ref().map(Address::one_line)?;
        if line.is_empty() {
            return None;
        }
        let kind = preference.delivery_type.unwrap_or_default();
        Some(format!("{}: {line}", kind.label()))
    }
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("items", &self.items.get().len())
            .finish_non_exhaustive()
    }
}
