use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::common::ValidatedJson;
use crate::middleware_helpers::session::Buyer;
use crate::models::{Order, OrderItem};
use crate::services::orders::{CreateOrderInput, OrderDetail, Preview};
use crate::services::payment_composer::ChannelSummary;
use crate::services::pricing::{LineRequest, PricedLine};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewOrderReq {
    #[validate(length(min = 1, message = "skuSn is required"))]
    pub sku_sn: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub spu_sn: String,
    pub sku_sn: String,
    pub name: String,
    pub desc: String,
    pub original_price: i64,
    pub real_price: i64,
    pub quantity: i64,
}

impl From<&PricedLine> for ProductDto {
    fn from(line: &PricedLine) -> Self {
        Self {
            spu_sn: line.product.spu.sn.clone(),
            sku_sn: line.product.sku.sn.clone(),
            name: line.product.sku.name.clone(),
            desc: line.product.sku.desc.clone(),
            original_price: line.original_price,
            real_price: line.real_price,
            quantity: line.quantity,
        }
    }
}

/// Payment channel as sent by clients: only its type code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDto {
    #[serde(rename = "type", default)]
    pub channel_type: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOrderResp {
    pub products: Vec<ProductDto>,
    pub credits: i64,
    pub payments: Vec<PaymentDto>,
    pub policy: String,
}

impl From<Preview> for PreviewOrderResp {
    fn from(preview: Preview) -> Self {
        Self {
            products: preview.lines.iter().map(ProductDto::from).collect(),
            credits: preview.credits,
            payments: preview
                .channels
                .iter()
                .map(|c| PaymentDto {
                    channel_type: c.channel_type.code(),
                })
                .collect(),
            policy: preview.policy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductLineReq {
    pub sku_sn: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderReq {
    #[validate(length(min = 1, message = "requestId is required"))]
    pub request_id: String,
    #[validate(length(min = 1, message = "at least one product is required"))]
    pub products: Vec<ProductLineReq>,
    pub payments: Vec<PaymentDto>,
    pub original_total_price: i64,
    pub real_total_price: i64,
}

impl From<CreateOrderReq> for CreateOrderInput {
    fn from(req: CreateOrderReq) -> Self {
        Self {
            request_id: req.request_id,
            lines: req
                .products
                .into_iter()
                .map(|p| LineRequest {
                    sku_sn: p.sku_sn,
                    quantity: p.quantity,
                })
                .collect(),
            channels: req.payments.iter().map(|p| p.channel_type).collect(),
            original_total_price: req.original_total_price,
            real_total_price: req.real_total_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResp {
    pub order_sn: String,
    pub wechat_code_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderSnReq {
    #[validate(length(min = 1, message = "orderSn is required"))]
    pub order_sn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveOrderStatusResp {
    pub order_status: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteOrderReq {
    #[validate(length(min = 1, message = "orderSn is required"))]
    pub order_sn: String,
    #[validate(range(min = 1, message = "buyerId must be positive"))]
    pub buyer_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOrdersReq {
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub spu_id: i64,
    pub sku_id: i64,
    pub sku_name: String,
    pub sku_description: String,
    pub sku_original_price: i64,
    pub sku_real_price: i64,
    pub quantity: i64,
}

impl From<&OrderItem> for OrderItemDto {
    fn from(item: &OrderItem) -> Self {
        Self {
            spu_id: item.spu_id,
            sku_id: item.sku_id,
            sku_name: item.sku_name.clone(),
            sku_description: item.sku_description.clone(),
            sku_original_price: item.sku_original_price,
            sku_real_price: item.sku_real_price,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecordDto {
    #[serde(rename = "type")]
    pub channel_type: i64,
    pub amount: i64,
}

impl From<&ChannelSummary> for PaymentRecordDto {
    fn from(summary: &ChannelSummary) -> Self {
        Self {
            channel_type: summary.channel.code(),
            amount: summary.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub sn: String,
    pub payment_sn: String,
    pub original_total_price: i64,
    pub real_total_price: i64,
    pub status: i32,
    pub items: Vec<OrderItemDto>,
    pub payments: Vec<PaymentRecordDto>,
    pub ctime: i64,
    pub utime: i64,
}

impl OrderDto {
    fn new(order: &Order, payments: &[ChannelSummary]) -> Self {
        Self {
            sn: order.sn.clone(),
            payment_sn: order.payment_sn.clone(),
            original_total_price: order.original_total_price,
            real_total_price: order.real_total_price,
            status: order.status.code(),
            items: order.items.iter().map(OrderItemDto::from).collect(),
            payments: payments.iter().map(PaymentRecordDto::from).collect(),
            ctime: order.ctime,
            utime: order.utime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveOrderDetailResp {
    pub order: OrderDto,
}

impl From<OrderDetail> for RetrieveOrderDetailResp {
    fn from(detail: OrderDetail) -> Self {
        Self {
            order: OrderDto::new(&detail.order, &detail.payments),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOrdersResp {
    pub total: u64,
    pub orders: Vec<OrderDto>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CloseTimeoutOrdersReq {
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: u64,
    #[validate(range(min = 0, message = "minute must not be negative"))]
    pub minute: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTimeoutOrdersResp {
    pub found: usize,
    pub expired: u64,
}

/// POST /order/preview
pub async fn preview_order(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<PreviewOrderReq>,
) -> ApiResult<PreviewOrderResp> {
    let preview = state
        .services
        .order
        .preview(buyer_id, &req.sku_sn, req.quantity)
        .await?;
    Ok(Json(ApiResponse::success(preview.into())))
}

/// POST /order/create
pub async fn create_order(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<CreateOrderReq>,
) -> ApiResult<CreateOrderResp> {
    let created = state
        .services
        .order
        .create_order(buyer_id, req.into())
        .await?;
    Ok(Json(ApiResponse::success(CreateOrderResp {
        order_sn: created.order_sn,
        wechat_code_url: created.wechat_code_url,
    })))
}

/// POST /order
pub async fn retrieve_order_status(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<OrderSnReq>,
) -> ApiResult<RetrieveOrderStatusResp> {
    let status = state
        .services
        .order
        .retrieve_order_status(buyer_id, &req.order_sn)
        .await?;
    Ok(Json(ApiResponse::success(RetrieveOrderStatusResp {
        order_status: status.code(),
    })))
}

/// POST /order/detail
pub async fn retrieve_order_detail(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<OrderSnReq>,
) -> ApiResult<RetrieveOrderDetailResp> {
    let detail = state
        .services
        .order
        .retrieve_order_detail(buyer_id, &req.order_sn)
        .await?;
    Ok(Json(ApiResponse::success(detail.into())))
}

/// POST /order/list
pub async fn list_orders(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<ListOrdersReq>,
) -> ApiResult<ListOrdersResp> {
    let page = state
        .services
        .order
        .list_orders(buyer_id, req.offset, req.limit)
        .await?;
    Ok(Json(ApiResponse::success(ListOrdersResp {
        total: page.total,
        orders: page.orders.iter().map(|o| OrderDto::new(o, &[])).collect(),
    })))
}

/// POST /order/complete
///
/// Called once payment settles; the buyer comes from the body, not the session.
pub async fn complete_order(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CompleteOrderReq>,
) -> ApiResult<()> {
    state
        .services
        .order
        .complete_order(req.buyer_id, &req.order_sn)
        .await?;
    Ok(Json(ApiResponse::ok()))
}

/// POST /order/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Buyer(buyer_id): Buyer,
    ValidatedJson(req): ValidatedJson<OrderSnReq>,
) -> ApiResult<()> {
    state
        .services
        .order
        .cancel_order(buyer_id, &req.order_sn)
        .await?;
    Ok(Json(ApiResponse::ok()))
}

/// POST /order/close
///
/// Runs one sweep batch; a scheduler is expected to call it repeatedly.
pub async fn close_timeout_orders(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CloseTimeoutOrdersReq>,
) -> ApiResult<CloseTimeoutOrdersResp> {
    let outcome = state
        .services
        .order
        .close_timeout_orders(req.minute, req.limit)
        .await?;
    Ok(Json(ApiResponse::success(CloseTimeoutOrdersResp {
        found: outcome.found,
        expired: outcome.expired,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_accepts_partial_bodies() {
        let req: CreateOrderReq = serde_json::from_str(r#"{"requestId":"r-1"}"#).unwrap();
        assert_eq!(req.request_id, "r-1");
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_request_needs_products() {
        let req: CreateOrderReq = serde_json::from_value(serde_json::json!({
            "requestId": "r-3",
            "products": [],
            "payments": [{"type": 1}]
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("products"));
    }

    #[test]
    fn create_request_maps_into_service_input() {
        let req: CreateOrderReq = serde_json::from_value(serde_json::json!({
            "requestId": "r-2",
            "products": [{"skuSn": "SKU100", "quantity": 2}],
            "payments": [{"type": 1}, {"type": 2}],
            "originalTotalPrice": 1980,
            "realTotalPrice": 1980
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let input = CreateOrderInput::from(req);
        assert_eq!(input.channels, vec![1, 2]);
        assert_eq!(input.lines[0].quantity, 2);
    }

    #[test]
    fn payment_records_serialize_type_field() {
        let value = serde_json::to_value(PaymentRecordDto {
            channel_type: 1,
            amount: 9900,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"type": 1, "amount": 9900}));
    }
}
