//! Order repository.
//!
//! Orders are returned ETA-settled: a stored `placed` order whose ETA has
//! elapsed reads back as `delivered`. The stored status only changes through
//! [`OrderRepository::save_for_owner`].

use pizza_time_core::{
    EpochMillis, NewOrder, Order, OrderId, OrderStatus, UserId, sort_most_recent_first,
};

use super::{Db, Query, RepositoryError, decode, decode_all, encode, encode_new};

pub const COLLECTION: &str = "orders";

/// Repository for pizza orders.
pub struct OrderRepository<'a> {
    db: &'a Db,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(db: &'a Db) -> Self {
        Self { db }
    }

    fn owned(owner: &UserId) -> Query {
        Query::all().eq("userId", owner.as_str())
    }

    /// The owner's orders, newest first, settled as of `now`.
    pub async fn list_for_owner(&self, owner: &UserId, now: EpochMillis) -> Vec<Order> {
        let docs = self.db.find(COLLECTION, &Self::owned(owner)).await;
        let mut orders: Vec<Order> = decode_all::<Order>(COLLECTION, docs)
            .into_iter()
            .map(|order| order.settled(now))
            .collect();
        sort_most_recent_first(&mut orders);
        orders
    }

    /// One of the owner's orders exactly as stored, without ETA settlement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored record is malformed.
    pub async fn get_stored_for_owner(
        &self,
        owner: &UserId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let query = Self::owned(owner).eq("id", id.as_str());
        let Some(doc) = self.db.find_one(COLLECTION, &query).await else {
            return Ok(None);
        };
        Ok(Some(decode::<Order>(doc)?))
    }

    /// One of the owner's orders, settled as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored record is malformed.
    pub async fn get_for_owner(
        &self,
        owner: &UserId,
        id: &OrderId,
        now: EpochMillis,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .get_stored_for_owner(owner, id)
            .await?
            .map(|order| order.settled(now)))
    }

    /// Store a new order for `owner`. It always starts `placed`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn create(
        &self,
        owner: &UserId,
        new: NewOrder,
        now: EpochMillis,
    ) -> Result<Order, RepositoryError> {
        let order = new.into_order(OrderId::new(""), Some(owner.clone()), now);
        let saved = self.db.insert(COLLECTION, encode_new(&order)?).await?;
        decode(saved)
    }

    /// Persist the mutable fields of an owner's order.
    ///
    /// The write only lands while the stored status is still `expected`, so
    /// two racing status changes cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such order belongs to `owner`.
    /// Returns `RepositoryError::Conflict` if the stored status is no longer `expected`.
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn save_for_owner(
        &self,
        owner: &UserId,
        order: &Order,
        expected: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mine = Self::owned(owner).eq("id", order.id.as_str());
        let guarded = mine.clone().eq("status", expected.as_str());
        let mut fields = encode(order)?;
        fields.remove("userId");

        match self
            .db
            .find_one_and_update(COLLECTION, &guarded, fields)
            .await?
        {
            Some(doc) => decode(doc),
            None if self.db.find_one(COLLECTION, &mine).await.is_some() => Err(
                RepositoryError::Conflict("Order was changed by another request".to_owned()),
            ),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Remove every order belonging to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn delete_all_for_owner(&self, owner: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.db.delete(COLLECTION, &Self::owned(owner)).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pizza_time_core::{Price, ProductSnapshot};

    use super::*;
    use crate::db::file::FileStore;

    const MINUTE: i64 = 60_000;

    async fn db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, Db::new(Arc::new(store)))
    }

    fn pepperoni(placed_at: i64) -> NewOrder {
        NewOrder::simulated(
            ProductSnapshot {
                pizza_id: "pepperoni".to_owned(),
                pizza_name: "Pepperoni".to_owned(),
                pizza_image: None,
                pizza_price: Some(Price::from_cents(1499)),
                note: None,
            },
            EpochMillis::new(placed_at),
        )
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_owner_scoped() {
        let (_dir, db) = db().await;
        let orders = OrderRepository::new(&db);
        let owner = UserId::new("alice");
        let now = EpochMillis::new(0);

        orders.create(&owner, pepperoni(1), now).await.unwrap();
        orders.create(&owner, pepperoni(3), now).await.unwrap();
        orders.create(&UserId::new("bob"), pepperoni(2), now).await.unwrap();

        let listed = orders.list_for_owner(&owner, now).await;
        let placed: Vec<i64> = listed.iter().map(|o| o.placed_at.as_i64()).collect();
        assert_eq!(placed, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_reads_are_eta_settled() {
        let (_dir, db) = db().await;
        let orders = OrderRepository::new(&db);
        let owner = UserId::new("alice");
        let created = orders
            .create(&owner, pepperoni(0), EpochMillis::new(0))
            .await
            .unwrap();
        assert_eq!(created.status, OrderStatus::Placed);

        let later = EpochMillis::new(16 * MINUTE);
        let read = orders
            .get_for_owner(&owner, &created.id, later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_save_persists_status() {
        let (_dir, db) = db().await;
        let orders = OrderRepository::new(&db);
        let owner = UserId::new("alice");
        let now = EpochMillis::new(0);
        let mut order = orders.create(&owner, pepperoni(0), now).await.unwrap();

        order.transition(OrderStatus::Cancelled, now).unwrap();
        orders
            .save_for_owner(&owner, &order, OrderStatus::Placed)
            .await
            .unwrap();

        let read = orders
            .get_for_owner(&owner, &order.id, EpochMillis::new(60 * MINUTE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_save_for_other_owner_is_not_found() {
        let (_dir, db) = db().await;
        let orders = OrderRepository::new(&db);
        let now = EpochMillis::new(0);
        let order = orders
            .create(&UserId::new("alice"), pepperoni(0), now)
            .await
            .unwrap();

        let err = orders
            .save_for_owner(&UserId::new("bob"), &order, OrderStatus::Placed)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_save_against_stale_status_conflicts() {
        let (_dir, db) = db().await;
        let orders = OrderRepository::new(&db);
        let owner = UserId::new("alice");
        let now = EpochMillis::new(0);
        let created = orders.create(&owner, pepperoni(0), now).await.unwrap();

        let mut cancelled = created.clone();
        cancelled.transition(OrderStatus::Cancelled, now).unwrap();
        let mut accepted = created;
        accepted.transition(OrderStatus::Accepted, now).unwrap();

        orders
            .save_for_owner(&owner, &cancelled, OrderStatus::Placed)
            .await
            .unwrap();
        let err = orders
            .save_for_owner(&owner, &accepted, OrderStatus::Placed)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = orders
            .get_stored_for_owner(&owner, &cancelled.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }
}
