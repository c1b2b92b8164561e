use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Catalog status of an SPU or SKU that may be sold.
pub const STATUS_ON_SHELF: i64 = 2;

/// `sale_type` of a SKU with no per-purchase cap.
pub const SALE_TYPE_UNLIMITED: i64 = 1;
/// `sale_type` of a SKU capped at `stock_limit` units per purchase.
pub const SALE_TYPE_LIMITED: i64 = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spu {
    pub id: i64,
    pub sn: String,
    pub name: String,
    pub desc: String,
    pub status: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: i64,
    pub sn: String,
    pub name: String,
    pub desc: String,
    pub price: i64,
    pub stock: i64,
    #[serde(default)]
    pub stock_limit: i64,
    pub sale_type: i64,
    pub status: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub spu: Spu,
    pub sku: Sku,
}

impl Product {
    pub fn is_on_shelf(&self) -> bool {
        self.spu.status == STATUS_ON_SHELF && self.sku.status == STATUS_ON_SHELF
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductService: Send + Sync {
    /// Looks up the product owning SKU `sn`; `NotFound` when it does not exist.
    async fn find_by_sku_sn(&self, sn: &str) -> Result<Product, ServiceError>;
}
