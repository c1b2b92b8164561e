use crate::errors::ServiceError;
use crate::repositories::NewOrderItem;
use crate::services::product::{Product, ProductService, SALE_TYPE_LIMITED};
use crate::services::with_deadline;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One requested purchase line: a SKU serial number and how many units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineRequest {
    pub sku_sn: String,
    pub quantity: i64,
}

/// A line priced against the catalog at request time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: i64,
    pub original_price: i64,
    pub real_price: i64,
}

impl PricedLine {
    /// Snapshot written to `order_items`.
    pub fn to_order_item(&self) -> NewOrderItem {
        NewOrderItem {
            spu_id: self.product.spu.id,
            sku_id: self.product.sku.id,
            sku_name: self.product.sku.name.clone(),
            sku_description: self.product.sku.desc.clone(),
            sku_original_price: self.original_price,
            sku_real_price: self.real_price,
            quantity: self.quantity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub original_total_price: i64,
    pub real_total_price: i64,
}

/// Validates stock and purchase limits and recomputes totals from
/// authoritative SKU prices.
#[derive(Clone)]
pub struct PricingChecker {
    products: Arc<dyn ProductService>,
    timeout: Duration,
}

impl PricingChecker {
    pub fn new(products: Arc<dyn ProductService>, timeout: Duration) -> Self {
        Self { products, timeout }
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn price(&self, lines: &[LineRequest]) -> Result<PricedOrder, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput(
                "at least one product is required".to_string(),
            ));
        }

        let mut priced = Vec::with_capacity(lines.len());
        let mut original_total: i64 = 0;
        let mut real_total: i64 = 0;
        // Lines naming the same SKU draw on the same stock and purchase limit.
        let mut requested: HashMap<String, i64> = HashMap::new();

        for line in lines {
            let priced_line = self.price_line(line).await?;
            let sku = &priced_line.product.sku;
            let quantity = requested.entry(sku.sn.clone()).or_insert(0);
            *quantity = quantity.checked_add(priced_line.quantity).ok_or_else(|| {
                ServiceError::InvalidInput(format!("quantity of {} overflows", sku.sn))
            })?;
            check_availability(&priced_line.product, *quantity)?;
            original_total = original_total
                .checked_add(priced_line.original_price * priced_line.quantity)
                .ok_or_else(|| ServiceError::InvalidInput("order total overflows".to_string()))?;
            real_total = real_total
                .checked_add(priced_line.real_price * priced_line.quantity)
                .ok_or_else(|| ServiceError::InvalidInput("order total overflows".to_string()))?;
            priced.push(priced_line);
        }

        debug!(original_total, real_total, "order priced");
        Ok(PricedOrder {
            lines: priced,
            original_total_price: original_total,
            real_total_price: real_total,
        })
    }

    /// Prices `lines` and requires the client's totals to match exactly.
    pub async fn check(
        &self,
        lines: &[LineRequest],
        claimed_original_total: i64,
        claimed_real_total: i64,
    ) -> Result<PricedOrder, ServiceError> {
        let priced = self.price(lines).await?;
        verify_totals(&priced, claimed_original_total, claimed_real_total)?;
        Ok(priced)
    }

    async fn price_line(&self, line: &LineRequest) -> Result<PricedLine, ServiceError> {
        if line.sku_sn.trim().is_empty() {
            return Err(ServiceError::InvalidInput("sku serial number is empty".to_string()));
        }
        if line.quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "quantity {} of {} must be positive",
                line.quantity, line.sku_sn
            )));
        }

        let product = with_deadline(
            "product service",
            self.timeout,
            self.products.find_by_sku_sn(&line.sku_sn),
        )
        .await?;

        if !product.is_on_shelf() {
            return Err(ServiceError::InvalidInput(format!(
                "{} is not on shelf",
                line.sku_sn
            )));
        }
        if line.quantity.checked_mul(product.sku.price).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "line total of {} overflows",
                line.sku_sn
            )));
        }

        let price = product.sku.price;
        Ok(PricedLine {
            product,
            quantity: line.quantity,
            original_price: price,
            real_price: price,
        })
    }
}

/// `requested` is the quantity of this SKU across the whole order.
fn check_availability(product: &Product, requested: i64) -> Result<(), ServiceError> {
    let sku = &product.sku;
    if requested > sku.stock {
        return Err(ServiceError::InsufficientStock(format!(
            "{} has {} left, {} requested",
            sku.sn, sku.stock, requested
        )));
    }
    if sku.sale_type == SALE_TYPE_LIMITED && requested > sku.stock_limit {
        return Err(ServiceError::PurchaseLimitExceeded(format!(
            "{} allows {} per purchase, {} requested",
            sku.sn, sku.stock_limit, requested
        )));
    }
    Ok(())
}

/// Client totals must equal the recomputed ones; close is not enough.
pub fn verify_totals(
    priced: &PricedOrder,
    claimed_original_total: i64,
    claimed_real_total: i64,
) -> Result<(), ServiceError> {
    if claimed_real_total > claimed_original_total {
        return Err(ServiceError::PriceMismatch(format!(
            "real total {claimed_real_total} exceeds original total {claimed_original_total}"
        )));
    }
    if priced.original_total_price != claimed_original_total {
        warn!(
            expected = priced.original_total_price,
            claimed = claimed_original_total,
            "original total mismatch"
        );
        return Err(ServiceError::PriceMismatch(format!(
            "original total {claimed_original_total} does not match {}",
            priced.original_total_price
        )));
    }
    if priced.real_total_price != claimed_real_total {
        warn!(
            expected = priced.real_total_price,
            claimed = claimed_real_total,
            "real total mismatch"
        );
        return Err(ServiceError::PriceMismatch(format!(
            "real total {claimed_real_total} does not match {}",
            priced.real_total_price
        )));
    }
    Ok(())
}
