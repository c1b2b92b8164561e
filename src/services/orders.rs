use crate::config::OrderConfig;
use crate::entities::now_millis;
use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus};
use crate::repositories::{NewOrder, OrderStore};
use crate::services::credit::CreditService;
use crate::services::idempotency::RequestGuard;
use crate::services::order_lifecycle::{OrderLifecycle, SweepOutcome};
use crate::services::payment::Channel;
use crate::services::payment_composer::{parse_channels, ChannelSummary, PaymentComposer};
use crate::services::pricing::{LineRequest, PricedLine, PricingChecker};
use crate::services::with_deadline;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Quote shown before purchase. Nothing is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    pub lines: Vec<PricedLine>,
    pub credits: i64,
    pub channels: Vec<Channel>,
    pub policy: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOrderInput {
    pub request_id: String,
    pub lines: Vec<LineRequest>,
    pub channels: Vec<i64>,
    pub original_total_price: i64,
    pub real_total_price: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_sn: String,
    pub wechat_code_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDetail {
    pub order: Order,
    pub payments: Vec<ChannelSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

/// Entry point of the order module used by the HTTP handlers.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    pricing: PricingChecker,
    composer: PaymentComposer,
    guard: RequestGuard,
    lifecycle: OrderLifecycle,
    credits: Arc<dyn CreditService>,
    purchase_policy: String,
    collaborator_timeout: Duration,
    max_list_limit: u64,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        pricing: PricingChecker,
        composer: PaymentComposer,
        guard: RequestGuard,
        lifecycle: OrderLifecycle,
        credits: Arc<dyn CreditService>,
        config: &OrderConfig,
    ) -> Self {
        Self {
            store,
            pricing,
            composer,
            guard,
            lifecycle,
            credits,
            purchase_policy: config.purchase_policy.clone(),
            collaborator_timeout: config.collaborator_timeout(),
            max_list_limit: config.max_list_limit,
        }
    }

    #[instrument(skip(self))]
    pub async fn preview(
        &self,
        buyer_id: i64,
        sku_sn: &str,
        quantity: i64,
    ) -> Result<Preview, ServiceError> {
        let priced = self
            .pricing
            .price(&[LineRequest {
                sku_sn: sku_sn.to_string(),
                quantity,
            }])
            .await?;

        let (channels, credit) = tokio::try_join!(
            self.composer.available_channels(),
            with_deadline(
                "credit service",
                self.collaborator_timeout,
                self.credits.get_credits_by_uid(buyer_id),
            ),
        )?;

        Ok(Preview {
            lines: priced.lines,
            credits: credit.total_amount,
            channels,
            policy: self.purchase_policy.clone(),
        })
    }

    /// Creates an order and its payment. The request id is claimed first and
    /// released again if anything fails before the order is stored.
    #[instrument(skip(self, input), fields(request_id = %input.request_id))]
    pub async fn create_order(
        &self,
        buyer_id: i64,
        input: CreateOrderInput,
    ) -> Result<CreatedOrder, ServiceError> {
        let claim = self.guard.claim(buyer_id, &input.request_id).await?;
        match self.create_claimed(buyer_id, input).await {
            Ok(created) => Ok(created),
            Err(e) => {
                self.guard.release(claim).await;
                Err(e)
            }
        }
    }

    async fn create_claimed(
        &self,
        buyer_id: i64,
        input: CreateOrderInput,
    ) -> Result<CreatedOrder, ServiceError> {
        let priced = self
            .pricing
            .check(
                &input.lines,
                input.original_total_price,
                input.real_total_price,
            )
            .await?;
        let channels = parse_channels(&input.channels)?;

        let order_sn = Uuid::new_v4().simple().to_string();
        let payment = self
            .composer
            .compose(&order_sn, priced.real_total_price, &channels)
            .await?;

        let items = priced.lines.iter().map(PricedLine::to_order_item).collect();
        let order_id = self
            .store
            .create_order(
                NewOrder {
                    sn: order_sn.clone(),
                    buyer_id,
                    payment_id: payment.payment_id,
                    payment_sn: payment.payment_sn.clone(),
                    original_total_price: priced.original_total_price,
                    real_total_price: priced.real_total_price,
                    ctime: now_millis(),
                },
                items,
            )
            .await?;

        counter!("orders.created", 1);
        info!(order_id, order_sn = %order_sn, buyer_id, "order created");
        Ok(CreatedOrder {
            wechat_code_url: payment.wechat_code_url(),
            order_sn,
        })
    }

    #[instrument(skip(self))]
    pub async fn retrieve_order_status(
        &self,
        buyer_id: i64,
        sn: &str,
    ) -> Result<OrderStatus, ServiceError> {
        let order = self.find_owned(buyer_id, sn).await?;
        Ok(order.status)
    }

    #[instrument(skip(self))]
    pub async fn retrieve_order_detail(
        &self,
        buyer_id: i64,
        sn: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order = self.find_owned(buyer_id, sn).await?;
        let payments = self.composer.channel_summaries(order.payment_id).await?;
        Ok(OrderDetail { order, payments })
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        buyer_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<OrderPage, ServiceError> {
        if limit == 0 || limit > self.max_list_limit {
            return Err(ServiceError::InvalidInput(format!(
                "limit must be between 1 and {}",
                self.max_list_limit
            )));
        }

        let (orders, total) = tokio::try_join!(
            self.store.list_orders(buyer_id, offset, limit),
            self.store.count_orders(buyer_id),
        )?;
        Ok(OrderPage { orders, total })
    }

    pub async fn complete_order(&self, buyer_id: i64, sn: &str) -> Result<(), ServiceError> {
        self.lifecycle.complete(sn, buyer_id).await
    }

    pub async fn cancel_order(&self, buyer_id: i64, sn: &str) -> Result<(), ServiceError> {
        self.lifecycle.cancel(sn, buyer_id).await
    }

    pub async fn close_timeout_orders(
        &self,
        older_than_minutes: i64,
        limit: u64,
    ) -> Result<SweepOutcome, ServiceError> {
        self.lifecycle
            .expire_timeout_orders(older_than_minutes, limit)
            .await
    }

    async fn find_owned(&self, buyer_id: i64, sn: &str) -> Result<Order, ServiceError> {
        if sn.trim().is_empty() {
            return Err(ServiceError::InvalidInput("order sn is empty".to_string()));
        }
        self.store.find_order_by_sn_and_buyer_id(sn, buyer_id).await
    }
}
