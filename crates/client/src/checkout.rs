//! Mock-payment checkout.
//!
//! Turns every unit in the cart into its own order. The cart is cleared once,
//! after the last unit has been converted. If a unit fails, the units already
//! converted are taken off the cart and the rest stay for a retry.

use std::collections::HashMap;
use std::sync::LazyLock;

use pizza_time_core::{Order, Price, ProductSnapshot};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::cart::{Cart, CartItem};
use crate::error::CheckoutError;
use crate::orders::OrderTracker;

static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("Invalid regex"));

static CVV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}$").expect("Invalid regex"));

const CARD_DIGITS: usize = 16;
const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;

/// Card details entered on the payment form. Nothing is charged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    pub card_number: String,
    /// `MM/YY`.
    pub expiry: String,
    pub cvv: String,
    pub cardholder_name: String,
    pub billing_address: Option<String>,
}

impl PaymentDetails {
    /// Check the form the way the payment page does.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidPayment`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let card: String = self
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if card.is_empty() || !card.chars().all(|c| c.is_ascii_digit()) {
            return Err(CheckoutError::InvalidPayment("card number must be digits"));
        }
        if card.len() != CARD_DIGITS {
            return Err(CheckoutError::InvalidPayment(
                "card number must have 16 digits",
            ));
        }
        if !EXPIRY_RE.is_match(&self.expiry) {
            return Err(CheckoutError::InvalidPayment("expiry must be MM/YY"));
        }
        if !CVV_RE.is_match(&self.cvv) {
            return Err(CheckoutError::InvalidPayment("CVV must be 3 digits"));
        }
        let name_len = self.cardholder_name.trim().chars().count();
        if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
            return Err(CheckoutError::InvalidPayment(
                "cardholder name must be 2 to 50 characters",
            ));
        }
        Ok(())
    }
}

/// Result of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub orders: Vec<Order>,
    pub total: Price,
    /// Whether every order reached the gateway.
    pub synced: bool,
}

/// Item note and checkout instructions, joined with ` | `.
fn combined_note(item_note: Option<&str>, instructions: &str) -> Option<String> {
    let parts: Vec<&str> = [item_note.unwrap_or_default(), instructions]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}

fn snapshot(item: &CartItem, instructions: &str) -> ProductSnapshot {
    ProductSnapshot {
        pizza_id: item.pizza_id.clone(),
        pizza_name: item.pizza_name.clone(),
        pizza_image: item.pizza_image.clone(),
        pizza_price: Some(item.pizza_price),
        note: combined_note(item.note.as_deref(), instructions),
    }
}

/// Pay for the cart and place one order per unit.
///
/// # Errors
///
/// Returns [`CheckoutError::InvalidPayment`] or [`CheckoutError::EmptyCart`]
/// before anything is placed, or [`CheckoutError::Partial`] when placement
/// stops midway.
#[instrument(skip_all, fields(units = cart.item_count()))]
pub async fn checkout(
    cart: &Cart,
    orders: &OrderTracker,
    instructions: &str,
    payment: &PaymentDetails,
) -> Result<Receipt, CheckoutError> {
    payment.validate()?;
    let items = cart.items();
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let requested = cart.item_count();
    let total = cart.total();

    let mut placed = Vec::new();
    let mut synced = true;
    let mut converted: HashMap<&str, u32> = HashMap::new();

    for item in &items {
        for _ in 0..item.quantity {
            match orders.place_order(snapshot(item, instructions)).await {
                Ok(order) => {
                    synced &= order.is_synced();
                    placed.push(order.into_inner());
                    *converted.entry(item.id.as_str()).or_default() += 1;
                }
                Err(source) => {
                    for (line_id, units) in &converted {
                        cart.deduct(line_id, *units);
                    }
                    warn!(placed = placed.len(), requested, error = %source, "checkout stopped");
                    return Err(CheckoutError::Partial {
                        placed: placed.into_iter().map(|order| order.id).collect(),
                        requested,
                        source,
                    });
                }
            }
        }
    }

    cart.clear();
    info!(orders = placed.len(), synced, "checkout complete");
    Ok(Receipt {
        orders: placed,
        total,
        synced,
    })
}
