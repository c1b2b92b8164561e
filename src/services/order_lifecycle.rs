use crate::errors::ServiceError;
use crate::models::OrderStatus;
use crate::repositories::OrderStore;
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of one timeout sweep batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    /// Stale orders picked up by the batch query.
    pub found: usize,
    /// Orders actually moved to Expired. Lower than `found` when a buyer
    /// completed or canceled an order between the query and the update.
    pub expired: u64,
}

/// Guarded status transitions. Every order leaves Unpaid at most once.
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn complete(&self, sn: &str, buyer_id: i64) -> Result<(), ServiceError> {
        self.transition(sn, buyer_id, OrderStatus::Completed).await
    }

    pub async fn cancel(&self, sn: &str, buyer_id: i64) -> Result<(), ServiceError> {
        self.transition(sn, buyer_id, OrderStatus::Canceled).await
    }

    #[instrument(skip(self, sn), fields(order_sn = %sn))]
    async fn transition(&self, sn: &str, buyer_id: i64, to: OrderStatus) -> Result<(), ServiceError> {
        if sn.trim().is_empty() {
            return Err(ServiceError::InvalidInput("order sn is empty".to_string()));
        }
        if buyer_id <= 0 {
            return Err(ServiceError::InvalidInput(format!("invalid buyer id {buyer_id}")));
        }

        let moved = self
            .store
            .update_status_by_sn(sn, buyer_id, to.allowed_sources().to_vec(), to)
            .await?;

        if moved == 0 {
            counter!("orders.transition.conflict", 1);
            warn!("order is not unpaid or not owned by buyer");
            return Err(ServiceError::Conflict(format!("order {sn} cannot become {to}")));
        }

        info!("order status changed");
        Ok(())
    }

    /// Expires one batch of at most `limit` Unpaid orders created at least
    /// `older_than_minutes` ago, oldest id first. Repetition is up to the caller.
    #[instrument(skip(self))]
    pub async fn expire_timeout_orders(
        &self,
        older_than_minutes: i64,
        limit: u64,
    ) -> Result<SweepOutcome, ServiceError> {
        if older_than_minutes < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "staleness {older_than_minutes} must not be negative"
            )));
        }
        if limit == 0 {
            return Err(ServiceError::InvalidInput("sweep limit must be positive".to_string()));
        }

        let stale = self.store.find_timeout_orders(older_than_minutes, limit).await?;
        if stale.is_empty() {
            return Ok(SweepOutcome::default());
        }

        let found = stale.len();
        let ids = stale.into_iter().map(|o| o.id).collect();
        let expired = self
            .store
            .update_status_by_ids(
                ids,
                OrderStatus::Expired.allowed_sources().to_vec(),
                OrderStatus::Expired,
            )
            .await?;

        counter!("orders.expired", expired);
        info!(found, expired, "timeout sweep batch finished");
        Ok(SweepOutcome { found, expired })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Order;
    use crate::repositories::MockOrderStore;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;

    fn unpaid(id: i64) -> Order {
        Order {
            id,
            sn: format!("sn-{id}"),
            buyer_id: 1,
            payment_id: 0,
            payment_sn: String::new(),
            original_total_price: 100,
            real_total_price: 100,
            status: OrderStatus::Unpaid,
            items: vec![],
            ctime: 0,
            utime: 0,
        }
    }

    #[tokio::test]
    async fn complete_only_moves_unpaid_orders() {
        let mut store = MockOrderStore::new();
        store
            .expect_update_status_by_sn()
            .withf(|sn, buyer, from, to| {
                sn.to_string() == "sn-1"
                    && *buyer == 7
                    && from == &vec![OrderStatus::Unpaid]
                    && *to == OrderStatus::Completed
            })
            .times(1)
            .returning(|_, _, _, _| Ok(1));

        let lifecycle = OrderLifecycle::new(Arc::new(store));
        lifecycle.complete("sn-1", 7).await.unwrap();
    }

    #[tokio::test]
    async fn zero_rows_moved_is_a_conflict() {
        let mut store = MockOrderStore::new();
        store
            .expect_update_status_by_sn()
            .returning(|_, _, _, _| Ok(0));

        let lifecycle = OrderLifecycle::new(Arc::new(store));
        assert_matches!(
            lifecycle.cancel("sn-1", 7).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn blank_sn_and_bad_buyer_never_reach_the_store() {
        let lifecycle = OrderLifecycle::new(Arc::new(MockOrderStore::new()));
        assert_matches!(
            lifecycle.complete("", 7).await,
            Err(ServiceError::InvalidInput(_))
        );
        assert_matches!(
            lifecycle.complete("sn-1", 0).await,
            Err(ServiceError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn sweep_expires_exactly_one_batch() {
        let mut store = MockOrderStore::new();
        store
            .expect_find_timeout_orders()
            .with(eq(30), eq(3))
            .times(1)
            .returning(|_, _| Ok(vec![unpaid(1), unpaid(2), unpaid(3)]));
        store
            .expect_update_status_by_ids()
            .withf(|ids, from, to| {
                ids == &vec![1, 2, 3]
                    && from == &vec![OrderStatus::Unpaid]
                    && *to == OrderStatus::Expired
            })
            .times(1)
            .returning(|_, _, _| Ok(2));

        let lifecycle = OrderLifecycle::new(Arc::new(store));
        let outcome = lifecycle.expire_timeout_orders(30, 3).await.unwrap();
        assert_eq!(outcome, SweepOutcome { found: 3, expired: 2 });
    }

    #[tokio::test]
    async fn empty_backlog_skips_the_update() {
        let mut store = MockOrderStore::new();
        store
            .expect_find_timeout_orders()
            .returning(|_, _| Ok(vec![]));
        store.expect_update_status_by_ids().never();

        let lifecycle = OrderLifecycle::new(Arc::new(store));
        let outcome = lifecycle.expire_timeout_orders(0, 10).await.unwrap();
        assert_eq!(outcome, SweepOutcome::default());
    }

    #[tokio::test]
    async fn sweep_arguments_are_validated() {
        let lifecycle = OrderLifecycle::new(Arc::new(MockOrderStore::new()));
        assert_matches!(
            lifecycle.expire_timeout_orders(-1, 10).await,
            Err(ServiceError::InvalidInput(_))
        );
        assert_matches!(
            lifecycle.expire_timeout_orders(5, 0).await,
            Err(ServiceError::InvalidInput(_))
        );
    }
}
