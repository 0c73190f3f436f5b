//! Order tracking on the client.
//!
//! The tracker keeps the customer's orders newest first, writes through to
//! the gateway when it can and falls back to local storage when it cannot.
//! Reads return orders with their ETA-derived status applied; [`OrderTracker::sweep`]
//! persists those derived transitions.

use std::sync::Arc;

use mockable::Clock;
use pizza_time_core::{
    EpochMillis, NewOrder, Order, OrderId, OrderPatch, OrderStatus, Price, ProductSnapshot,
    sort_most_recent_first, total_spent,
};
use tracing::{info, instrument, warn};

use crate::api::Remote;
use crate::error::{ClientError, Result};
use crate::fallback::{Synced, remote_or_local};
use crate::observable::{Observable, Subscription};
use crate::storage::{LocalStore, ORDERS_KEY};

/// The customer's orders.
pub struct OrderTracker {
    remote: Arc<dyn Remote>,
    store: LocalStore,
    clock: Arc<dyn Clock>,
    orders: Observable<Vec<Order>>,
}

impl OrderTracker {
    /// Restore orders from `store`.
    pub fn new(remote: Arc<dyn Remote>, store: LocalStore, clock: Arc<dyn Clock>) -> Self {
        let mut orders = store.load::<Vec<Order>>(ORDERS_KEY).unwrap_or_default();
        sort_most_recent_first(&mut orders);
        Self {
            remote,
            store,
            clock,
            orders: Observable::new(orders),
        }
    }

    fn now(&self) -> EpochMillis {
        EpochMillis::from_datetime(self.clock.utc())
    }

    /// Edit the orders under the lock, persist, then publish. Nothing changes
    /// if the edit or the write fails.
    fn commit<R>(&self, edit: impl FnOnce(&mut Vec<Order>) -> Result<R>) -> Result<R> {
        self.orders.try_update(|orders| {
            let result = edit(orders)?;
            sort_most_recent_first(orders);
            self.store.save(ORDERS_KEY, orders)?;
            Ok(result)
        })
    }

    /// Edit the orders under the lock, publish, and persist best-effort.
    fn cache(&self, edit: impl FnOnce(&mut Vec<Order>)) {
        self.orders.update(|orders| {
            edit(orders);
            sort_most_recent_first(orders);
            if let Err(e) = self.store.save(ORDERS_KEY, orders) {
                warn!(error = %e, "failed to cache orders locally");
            }
        });
    }

    fn upsert(orders: &mut Vec<Order>, order: Order) {
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order,
            None => orders.push(order),
        }
    }

    /// Replace local orders with the gateway's list, keeping local ones when it is unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Synced<Vec<Order>>> {
        let synced = remote_or_local(self.remote.list_orders(), || Ok(self.orders.get())).await?;
        if let Synced::Remote(remote) = &synced {
            self.cache(|orders| orders.clone_from(remote));
        }
        Ok(synced.map(|_| self.orders()))
    }

    /// Place an order for `pizza` with the standard simulated delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway is unavailable and the order cannot be
    /// stored locally either.
    #[instrument(skip(self, pizza), fields(pizza_id = %pizza.pizza_id))]
    pub async fn place_order(&self, pizza: ProductSnapshot) -> Result<Synced<Order>> {
        let now = self.now();
        let new_order = NewOrder::simulated(pizza, now);

        let placed = remote_or_local(self.remote.create_order(&new_order), || {
            let order = new_order
                .clone()
                .into_order(OrderId::generate(), None, now);
            self.commit(|orders| {
                Self::upsert(orders, order.clone());
                Ok(())
            })?;
            Ok(order)
        })
        .await?;

        if let Synced::Remote(order) = &placed {
            self.cache(|orders| Self::upsert(orders, order.clone()));
        }
        info!(order_id = %placed.value().id, synced = placed.is_synced(), "order placed");
        Ok(placed)
    }

    /// Move order `id` to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the order is unknown locally and
    /// the gateway is unavailable, or [`ClientError::Status`] for an illegal move.
    #[instrument(skip(self))]
    pub async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<Synced<Order>> {
        let now = self.now();
        let patch = OrderPatch::status(status);

        let updated = remote_or_local(self.remote.update_order(id, &patch), || {
            self.commit(|orders| {
                let order = orders
                    .iter_mut()
                    .find(|o| &o.id == id)
                    .ok_or_else(|| ClientError::NotFound("Order".to_owned()))?;
                order.transition(status, now)?;
                Ok(order.clone())
            })
        })
        .await?;

        if let Synced::Remote(order) = &updated {
            self.cache(|orders| Self::upsert(orders, order.clone()));
        }
        Ok(updated.map(|order| order.settled(now)))
    }

    /// Cancel order `id`. Cancelling a delivered or cancelled order is an error.
    ///
    /// # Errors
    ///
    /// See [`OrderTracker::set_order_status`].
    pub async fn cancel_order(&self, id: &OrderId) -> Result<Synced<Order>> {
        self.set_order_status(id, OrderStatus::Cancelled).await
    }

    /// All orders, newest first, as of now.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        let now = self.now();
        self.orders
            .get()
            .into_iter()
            .map(|order| order.settled(now))
            .collect()
    }

    /// Persist ETA-driven deliveries. Returns the orders that changed.
    ///
    /// Safe to call repeatedly: the derivation only depends on `placedAt` and now.
    pub fn sweep(&self) -> Vec<OrderId> {
        let now = self.now();
        if !self.orders.get().iter().any(|order| order.is_due_for_delivery(now)) {
            return Vec::new();
        }

        // Re-derive under the lock: a concurrent write may have landed since.
        let due = self.orders.update(|orders| {
            let mut due = Vec::new();
            for order in orders.iter_mut().filter(|order| order.is_due_for_delivery(now)) {
                order.status = order.effective_status(now);
                due.push(order.id.clone());
            }
            if let Err(e) = self.store.save(ORDERS_KEY, orders) {
                warn!(error = %e, "failed to persist delivered orders");
            }
            due
        });
        info!(count = due.len(), "orders delivered by ETA");
        due
    }

    /// The most recent order that is still on its way.
    #[must_use]
    pub fn active_order(&self) -> Option<Order> {
        let now = self.now();
        self.orders().into_iter().find(|order| order.is_active(now))
    }

    #[must_use]
    pub fn find(&self, id: &OrderId) -> Option<Order> {
        self.orders().into_iter().find(|order| &order.id == id)
    }

    /// Orders whose current status is `status`.
    #[must_use]
    pub fn filter(&self, status: OrderStatus) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|order| order.status == status)
            .collect()
    }

    /// What the customer has paid for delivered orders.
    #[must_use]
    pub fn total_spent(&self) -> Price {
        total_spent(&self.orders.get(), self.now())
    }

    /// Minutes until order `id` arrives, never below zero.
    #[must_use]
    pub fn remaining_minutes(&self, id: &OrderId) -> Option<i64> {
        let now = self.now();
        self.orders
            .get()
            .iter()
            .find(|order| &order.id == id)
            .filter(|order| order.is_active(now))
            .and_then(|order| order.remaining_minutes(now))
            .map(|minutes| minutes.max(0))
    }

    /// Forget the local copy.
    pub(crate) fn forget(&self) {
        if let Err(e) = self.store.remove(ORDERS_KEY) {
            warn!(error = %e, "failed to remove persisted orders");
        }
        self.orders.update(Vec::clear);
    }

    /// Observe the stored orders.
    pub fn subscribe(&self, listener: impl Fn(&Vec<Order>) + Send + Sync + 'static) -> Subscription {
        self.orders.subscribe(listener)
    }
}

impl std::fmt::Debug for OrderTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTracker")
            .field("orders", &self.orders.get().len())
            .finish_non_exhaustive()
    }
}
