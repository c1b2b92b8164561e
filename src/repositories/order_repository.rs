use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::entities::now_millis;
use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as OrderEntity, Model as OrderModel,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
    Model as OrderItemModel,
};
use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus};

use super::{NewOrder, NewOrderItem, OrderStore};

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// sea-orm backed order store
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: Arc<DatabaseConnection>,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Loads the items of every order in `orders` with one query and
    /// attaches them, preserving the order of `orders`.
    async fn attach_items(&self, orders: Vec<OrderModel>) -> Result<Vec<Order>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .order_by_asc(order_item::Column::Id)
            .all(self.db())
            .await?;

        let mut by_order: HashMap<i64, Vec<OrderItemModel>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        orders
            .into_iter()
            .map(|model| {
                let items = by_order.remove(&model.id).unwrap_or_default();
                Order::from_model(model, items)
            })
            .collect()
    }

    async fn load_one(&self, model: Option<OrderModel>, sn: &str) -> Result<Order, ServiceError> {
        let model = model.ok_or_else(|| ServiceError::NotFound(format!("order {sn}")))?;
        self.attach_items(vec![model])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("order {sn}")))
    }
}

fn status_codes(statuses: &[OrderStatus]) -> Vec<i32> {
    statuses.iter().map(|s| s.code()).collect()
}

#[async_trait]
impl OrderStore for OrderRepository {
    #[instrument(skip(self, order, items), fields(order_sn = %order.sn, buyer_id = order.buyer_id))]
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<i64, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "an order needs at least one item".to_string(),
            ));
        }

        let txn = self.db().begin().await.map_err(|e| {
            error!(error = %e, "failed to begin order transaction");
            ServiceError::DatabaseError(e)
        })?;

        let header = OrderActiveModel {
            sn: Set(order.sn),
            buyer_id: Set(order.buyer_id),
            payment_id: Set(order.payment_id),
            payment_sn: Set(order.payment_sn),
            original_total_price: Set(order.original_total_price),
            real_total_price: Set(order.real_total_price),
            status: Set(OrderStatus::Unpaid.code()),
            ctime: Set(order.ctime),
            utime: Set(order.ctime),
            ..Default::default()
        };
        let order_id = OrderEntity::insert(header)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to insert order");
                ServiceError::DatabaseError(e)
            })?
            .last_insert_id;

        let rows = items.into_iter().map(|item| OrderItemActiveModel {
            order_id: Set(order_id),
            spu_id: Set(item.spu_id),
            sku_id: Set(item.sku_id),
            sku_name: Set(item.sku_name),
            sku_description: Set(item.sku_description),
            sku_original_price: Set(item.sku_original_price),
            sku_real_price: Set(item.sku_real_price),
            quantity: Set(item.quantity),
            ctime: Set(order.ctime),
            utime: Set(order.ctime),
            ..Default::default()
        });
        OrderItemEntity::insert_many(rows)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "failed to insert order items");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        debug!(order_id, "order persisted");
        Ok(order_id)
    }

    #[instrument(skip(self))]
    async fn find_order_by_sn(&self, sn: &str) -> Result<Order, ServiceError> {
        let model = OrderEntity::find()
            .filter(Column::Sn.eq(sn))
            .one(self.db())
            .await?;
        self.load_one(model, sn).await
    }

    #[instrument(skip(self))]
    async fn find_order_by_sn_and_buyer_id(
        &self,
        sn: &str,
        buyer_id: i64,
    ) -> Result<Order, ServiceError> {
        let model = OrderEntity::find()
            .filter(Column::Sn.eq(sn))
            .filter(Column::BuyerId.eq(buyer_id))
            .one(self.db())
            .await?;
        self.load_one(model, sn).await
    }

    #[instrument(skip(self))]
    async fn list_orders(
        &self,
        buyer_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Order>, ServiceError> {
        let models = OrderEntity::find()
            .filter(Column::BuyerId.eq(buyer_id))
            .order_by_desc(Column::Ctime)
            .order_by_desc(Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db())
            .await?;
        self.attach_items(models).await
    }

    #[instrument(skip(self))]
    async fn count_orders(&self, buyer_id: i64) -> Result<u64, ServiceError> {
        let total = OrderEntity::find()
            .filter(Column::BuyerId.eq(buyer_id))
            .count(self.db())
            .await?;
        Ok(total)
    }

    #[instrument(skip(self))]
    async fn update_status_by_sn(
        &self,
        sn: &str,
        buyer_id: i64,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<u64, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(Column::Status, Expr::value(to.code()))
            .col_expr(Column::Utime, Expr::value(now_millis()))
            .filter(Column::Sn.eq(sn))
            .filter(Column::BuyerId.eq(buyer_id))
            .filter(Column::Status.is_in(status_codes(&from)))
            .exec(self.db())
            .await?;
        Ok(result.rows_affected)
    }

    #[instrument(skip(self))]
    async fn find_timeout_orders(
        &self,
        older_than_minutes: i64,
        limit: u64,
    ) -> Result<Vec<Order>, ServiceError> {
        let cutoff = now_millis() - older_than_minutes.saturating_mul(MILLIS_PER_MINUTE);
        let models = OrderEntity::find()
            .filter(Column::Status.eq(OrderStatus::Unpaid.code()))
            .filter(Column::Ctime.lte(cutoff))
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(self.db())
            .await?;
        self.attach_items(models).await
    }

    #[instrument(skip(self, ids), fields(batch = ids.len()))]
    async fn update_status_by_ids(
        &self,
        ids: Vec<i64>,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<u64, ServiceError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = OrderEntity::update_many()
            .col_expr(Column::Status, Expr::value(to.code()))
            .col_expr(Column::Utime, Expr::value(now_millis()))
            .filter(Column::Id.is_in(ids))
            .filter(Column::Status.is_in(status_codes(&from)))
            .exec(self.db())
            .await?;
        Ok(result.rows_affected)
    }
}
