//! Background ETA sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::orders::OrderTracker;

/// Periodically persists ETA-driven deliveries. Stops when dropped.
#[derive(Debug)]
pub struct EtaSweep {
    handle: JoinHandle<()>,
}

impl EtaSweep {
    /// Start sweeping `tracker` every `period` on the current runtime.
    #[must_use]
    pub fn start(tracker: Arc<OrderTracker>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let delivered = tracker.sweep();
                if !delivered.is_empty() {
                    debug!(count = delivered.len(), "sweep delivered orders");
                }
            }
        });
        Self { handle }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the sweep.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for EtaSweep {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizza_time_core::{OrderStatus, Price, ProductSnapshot};

    use super::*;
    use crate::storage::{LocalStore, ORDERS_KEY};
    use crate::test_support::{FakeRemote, MutableClock};

    #[tokio::test]
    async fn test_sweep_persists_delivery() {
        let clock = MutableClock::at_millis(1_700_000_000_000);
        let store = LocalStore::in_memory();
        let tracker = Arc::new(OrderTracker::new(
            FakeRemote::offline(),
            store.clone(),
            clock.clone(),
        ));
        let id = tracker
            .place_order(ProductSnapshot {
                pizza_id: "margherita".to_owned(),
                pizza_name: "Margherita".to_owned(),
                pizza_image: None,
                pizza_price: Some(Price::from_cents(1200)),
                note: None,
            })
            .await
            .unwrap()
            .into_inner()
            .id;

        let sweep = EtaSweep::start(Arc::clone(&tracker), Duration::from_millis(5));
        assert!(sweep.is_running());
        clock.advance_minutes(16);

        let mut persisted = false;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let stored = store
                .load::<Vec<pizza_time_core::Order>>(ORDERS_KEY)
                .unwrap_or_default();
            if stored
                .iter()
                .any(|o| o.id == id && o.status == OrderStatus::Delivered)
            {
                persisted = true;
                break;
            }
        }
        sweep.stop();
        assert!(persisted);
    }
}
