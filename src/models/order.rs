use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use std::fmt;

/// Lifecycle state of an order. Stored as its integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OrderStatus {
    Unpaid = 1,
    Completed = 2,
    Canceled = 3,
    Expired = 4,
}

impl OrderStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Statuses an order must currently be in to move into `self`.
    pub fn allowed_sources(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Completed | OrderStatus::Canceled | OrderStatus::Expired => {
                &[OrderStatus::Unpaid]
            }
            OrderStatus::Unpaid => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        target.allowed_sources().contains(&self)
    }
}

impl TryFrom<i32> for OrderStatus {
    type Error = ServiceError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OrderStatus::Unpaid),
            2 => Ok(OrderStatus::Completed),
            3 => Ok(OrderStatus::Canceled),
            4 => Ok(OrderStatus::Expired),
            other => Err(ServiceError::InternalError(format!(
                "unknown order status code {other}"
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Unpaid => "unpaid",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub spu_id: i64,
    pub sku_id: i64,
    pub sku_name: String,
    pub sku_description: String,
    pub sku_original_price: i64,
    pub sku_real_price: i64,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub sn: String,
    pub buyer_id: i64,
    pub payment_id: i64,
    pub payment_sn: String,
    pub original_total_price: i64,
    pub real_total_price: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub ctime: i64,
    pub utime: i64,
}

impl From<order_item::Model> for OrderItem {
    fn from(model: order_item::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            spu_id: model.spu_id,
            sku_id: model.sku_id,
            sku_name: model.sku_name,
            sku_description: model.sku_description,
            sku_original_price: model.sku_original_price,
            sku_real_price: model.sku_real_price,
            quantity: model.quantity,
        }
    }
}

impl Order {
    pub fn from_model(
        model: order::Model,
        items: Vec<order_item::Model>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            id: model.id,
            status: OrderStatus::try_from(model.status)?,
            sn: model.sn,
            buyer_id: model.buyer_id,
            payment_id: model.payment_id,
            payment_sn: model.payment_sn,
            original_total_price: model.original_total_price,
            real_total_price: model.real_total_price,
            items: items.into_iter().map(OrderItem::from).collect(),
            ctime: model.ctime,
            utime: model.utime,
        })
    }
}
