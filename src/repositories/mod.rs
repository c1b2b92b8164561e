use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus};
use async_trait::async_trait;

pub mod order_repository;

pub use order_repository::OrderRepository;

/// Order header to persist. The store assigns the id and the Unpaid status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub sn: String,
    pub buyer_id: i64,
    pub payment_id: i64,
    pub payment_sn: String,
    pub original_total_price: i64,
    pub real_total_price: i64,
    pub ctime: i64,
}

/// Priced line item snapshot, written alongside its order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrderItem {
    pub spu_id: i64,
    pub sku_id: i64,
    pub sku_name: String,
    pub sku_description: String,
    pub sku_original_price: i64,
    pub sku_real_price: i64,
    pub quantity: i64,
}

/// Persistence contract for orders and their items.
///
/// Lookups scoped by buyer report a foreign order exactly like a missing one.
/// Status updates are compare-and-swap: they return the number of rows that
/// actually moved, and callers treat zero as a lost race.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order and every item in one transaction. Returns the new order id.
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<i64, ServiceError>;

    async fn find_order_by_sn(&self, sn: &str) -> Result<Order, ServiceError>;

    async fn find_order_by_sn_and_buyer_id(
        &self,
        sn: &str,
        buyer_id: i64,
    ) -> Result<Order, ServiceError>;

    /// Newest first, items included.
    async fn list_orders(
        &self,
        buyer_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Order>, ServiceError>;

    async fn count_orders(&self, buyer_id: i64) -> Result<u64, ServiceError>;

    async fn update_status_by_sn(
        &self,
        sn: &str,
        buyer_id: i64,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<u64, ServiceError>;

    /// Up to `limit` Unpaid orders created at least `older_than_minutes` ago,
    /// in ascending id order.
    async fn find_timeout_orders(
        &self,
        older_than_minutes: i64,
        limit: u64,
    ) -> Result<Vec<Order>, ServiceError>;

    async fn update_status_by_ids(
        &self,
        ids: Vec<i64>,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<u64, ServiceError>;
}
