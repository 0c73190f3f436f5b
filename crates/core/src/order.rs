//! Pizza orders and the ETA auto-delivery rule.
//!
//! An order's persisted `status` only records explicit transitions. The
//! status a customer actually sees is derived on every read: a live order
//! whose ETA has elapsed counts as delivered. See [`Order::effective_status`].

use serde::{Deserialize, Serialize};

use crate::types::{EpochMillis, OrderId, OrderStatus, Price, StatusError, UserId};

/// ETA given to every newly placed order, in minutes.
pub const DEFAULT_ETA_MINUTES: u32 = 15;

/// Courier name shown on the tracker for simulated deliveries.
pub const DEFAULT_COURIER_NAME: &str = "Maya";

/// The menu item an order was placed for, captured at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub pizza_id: String,
    pub pizza_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A placed pizza order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub status: OrderStatus,
    pub placed_at: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake_courier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Order {
    /// Minutes left before the ETA elapses: `eta - floor((now - placedAt) / 60s)`.
    ///
    /// `None` when the order carries no ETA.
    #[must_use]
    pub fn remaining_minutes(&self, now: EpochMillis) -> Option<i64> {
        self.eta_minutes
            .map(|eta| i64::from(eta) - self.placed_at.whole_minutes_until(now))
    }

    /// The status as of `now`.
    ///
    /// Terminal statuses are returned untouched. A live order whose remaining
    /// time is zero or less is delivered.
    #[must_use]
    pub fn effective_status(&self, now: EpochMillis) -> OrderStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        match self.remaining_minutes(now) {
            Some(remaining) if remaining <= 0 => OrderStatus::Delivered,
            _ => self.status,
        }
    }

    /// Whether the stored status lags behind the derived one.
    #[must_use]
    pub fn is_due_for_delivery(&self, now: EpochMillis) -> bool {
        self.effective_status(now) != self.status
    }

    /// Return the order with its ETA-derived status applied.
    #[must_use]
    pub fn settled(mut self, now: EpochMillis) -> Self {
        self.status = self.effective_status(now);
        self
    }

    /// Whether the order can still change (not delivered, not cancelled).
    #[must_use]
    pub fn is_active(&self, now: EpochMillis) -> bool {
        !self.effective_status(now).is_terminal()
    }

    /// Move to `next`, validated against the status as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] when the lifecycle forbids it.
    pub fn transition(&mut self, next: OrderStatus, now: EpochMillis) -> Result<(), StatusError> {
        self.status = self.effective_status(now).transition_to(next)?;
        Ok(())
    }
}

/// Body accepted when creating an order.
///
/// Lifecycle fields are not accepted: every order begins `placed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(flatten)]
    pub pizza: ProductSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_at: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake_courier_name: Option<String>,
}

impl NewOrder {
    /// An order for `pizza` with the standard simulated delivery settings.
    #[must_use]
    pub fn simulated(pizza: ProductSnapshot, placed_at: EpochMillis) -> Self {
        Self {
            pizza,
            placed_at: Some(placed_at),
            eta_minutes: Some(DEFAULT_ETA_MINUTES),
            fake_courier_name: Some(DEFAULT_COURIER_NAME.to_owned()),
        }
    }

    /// Materialize the order under `id`, defaulting `placedAt` to `now`.
    #[must_use]
    pub fn into_order(self, id: OrderId, user_id: Option<UserId>, now: EpochMillis) -> Order {
        Order {
            id,
            user_id,
            status: OrderStatus::Placed,
            placed_at: self.placed_at.unwrap_or(now),
            eta_minutes: self.eta_minutes,
            fake_courier_name: self.fake_courier_name,
            pizza_id: Some(self.pizza.pizza_id),
            pizza_name: Some(self.pizza.pizza_name),
            pizza_image: self.pizza.pizza_image,
            pizza_price: self.pizza.pizza_price,
            note: self.pizza.note,
        }
    }
}

/// Partial update accepted for an existing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake_courier_name: Option<String>,
}

impl OrderPatch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply onto `order`. Nothing changes if the status move is illegal.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] for an illegal status move.
    pub fn apply(self, order: &mut Order, now: EpochMillis) -> Result<(), StatusError> {
        if let Some(next) = self.status {
            order.transition(next, now)?;
        }
        if let Some(note) = self.note {
            order.note = Some(note);
        }
        if let Some(eta) = self.eta_minutes {
            order.eta_minutes = Some(eta);
        }
        if let Some(courier) = self.fake_courier_name {
            order.fake_courier_name = Some(courier);
        }
        Ok(())
    }
}

/// Sort orders by `placedAt`, newest first. Ties keep their relative order.
pub fn sort_most_recent_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
}

/// Sum of prices across orders that are delivered as of `now`.
#[must_use]
pub fn total_spent(orders: &[Order], now: EpochMillis) -> Price {
    orders
        .iter()
        .filter(|order| order.effective_status(now) == OrderStatus::Delivered)
        .filter_map(|order| order.pizza_price)
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    fn order_placed_at(placed_at: i64) -> Order {
        NewOrder::simulated(
            ProductSnapshot {
                pizza_id: "margherita".to_owned(),
                pizza_name: "Margherita".to_owned(),
                pizza_image: None,
                pizza_price: Some(Price::from_cents(1299)),
                note: None,
            },
            EpochMillis::new(placed_at),
        )
        .into_order(OrderId::new("o-1"), None, EpochMillis::new(placed_at))
    }

    #[test]
    fn test_new_order_defaults() {
        let order = order_placed_at(1_000);
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.eta_minutes, Some(DEFAULT_ETA_MINUTES));
        assert_eq!(order.fake_courier_name.as_deref(), Some("Maya"));
    }

    #[test]
    fn test_remaining_minutes_floors_elapsed_time() {
        let order = order_placed_at(0);
        assert_eq!(order.remaining_minutes(EpochMillis::new(0)), Some(15));
        assert_eq!(order.remaining_minutes(EpochMillis::new(MINUTE - 1)), Some(15));
        assert_eq!(order.remaining_minutes(EpochMillis::new(14 * MINUTE)), Some(1));
    }

    #[test]
    fn test_delivered_exactly_when_eta_elapses() {
        let order = order_placed_at(0);
        let just_before = EpochMillis::new(15 * MINUTE - 1);
        let at_eta = EpochMillis::new(15 * MINUTE);

        assert_eq!(order.effective_status(just_before), OrderStatus::Placed);
        assert_eq!(order.effective_status(at_eta), OrderStatus::Delivered);
        assert!(order.is_due_for_delivery(at_eta));
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let now = EpochMillis::new(20 * MINUTE);
        let once = order_placed_at(0).settled(now);
        let twice = once.clone().settled(now);
        assert_eq!(once, twice);
        assert_eq!(twice.status, OrderStatus::Delivered);
    }

    #[test]
    fn test_terminal_orders_are_left_alone() {
        let mut order = order_placed_at(0);
        order.status = OrderStatus::Cancelled;
        assert_eq!(
            order.effective_status(EpochMillis::new(60 * MINUTE)),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn test_order_without_eta_never_auto_delivers() {
        let mut order = order_placed_at(0);
        order.eta_minutes = None;
        assert_eq!(
            order.effective_status(EpochMillis::new(600 * MINUTE)),
            OrderStatus::Placed
        );
    }

    #[test]
    fn test_cancel_after_eta_is_rejected() {
        let mut order = order_placed_at(0);
        let err = order
            .transition(OrderStatus::Cancelled, EpochMillis::new(16 * MINUTE))
            .unwrap_err();
        assert!(matches!(err, StatusError::InvalidTransition { .. }));
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[test]
    fn test_patch_applies_fields() {
        let mut order = order_placed_at(0);
        let patch = OrderPatch {
            status: Some(OrderStatus::Accepted),
            note: Some("ring twice".to_owned()),
            ..OrderPatch::default()
        };
        patch.apply(&mut order, EpochMillis::new(MINUTE)).unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.note.as_deref(), Some("ring twice"));
    }

    #[test]
    fn test_sort_most_recent_first() {
        let mut orders = vec![order_placed_at(1), order_placed_at(3), order_placed_at(2)];
        sort_most_recent_first(&mut orders);
        let placed: Vec<i64> = orders.iter().map(|o| o.placed_at.as_i64()).collect();
        assert_eq!(placed, vec![3, 2, 1]);
    }

    #[test]
    fn test_placed_at_accepts_date_strings() {
        let json = serde_json::json!({
            "id": "o-9",
            "status": "on_the_way",
            "placedAt": "2024-01-01T00:00:00Z",
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.placed_at.as_i64(), 1_704_067_200_000);
        assert_eq!(order.status, OrderStatus::OnTheWay);
    }

    #[test]
    fn test_total_spent_counts_delivered_orders_only() {
        let now = EpochMillis::new(5 * MINUTE);
        let live = order_placed_at(0);
        let mut delivered = order_placed_at(0);
        delivered.status = OrderStatus::Delivered;
        let mut cancelled = order_placed_at(0);
        cancelled.status = OrderStatus::Cancelled;

        assert_eq!(
            total_spent(&[live, delivered, cancelled], now),
            Price::from_cents(1299)
        );
    }
}
