#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use academy_order::{
    cache::{CacheBackend, InMemoryCache},
    config::AppConfig,
    db,
    entities::now_millis,
    errors::ServiceError,
    handlers::{AppServices, Collaborators},
    repositories::{NewOrder, NewOrderItem, OrderRepository, OrderStore},
    services::{
        credit::{Credit, CreditService},
        payment::{Channel, ChannelType, Payment, PaymentService, Record},
        product::{Product, ProductService, Sku, Spu, SALE_TYPE_UNLIMITED, STATUS_ON_SHELF},
    },
    AppState,
};

/// Buyer id the gateway header carries in tests.
pub const BUYER: i64 = 234;
pub const CREDIT_BALANCE: i64 = 1000;
/// Payment preloaded in the fake payment service: a single 9900 credit leg.
pub const SEEDED_PAYMENT_ID: i64 = 33;
pub const SEEDED_PAYMENT_AMOUNT: i64 = 9900;

fn product(id: i64, price: i64, stock: i64) -> Product {
    Product {
        spu: Spu {
            id,
            sn: format!("SPUSN{id}"),
            name: format!("SPU{id}"),
            desc: format!("SPU{id} desc"),
            status: STATUS_ON_SHELF,
        },
        sku: Sku {
            id,
            sn: format!("SKU{id}"),
            name: format!("SKU{id}"),
            desc: format!("SKU{id} desc"),
            price,
            stock,
            stock_limit: 0,
            sale_type: SALE_TYPE_UNLIMITED,
            status: STATUS_ON_SHELF,
        },
    }
}

/// Catalog with SKU100 (990, stock 10) and SKU101 (9900, stock 1).
pub struct FakeProducts {
    catalog: HashMap<String, Product>,
}

impl Default for FakeProducts {
    fn default() -> Self {
        let catalog = [product(100, 990, 10), product(101, 9900, 1)]
            .into_iter()
            .map(|p| (p.sku.sn.clone(), p))
            .collect();
        Self { catalog }
    }
}

#[async_trait]
impl ProductService for FakeProducts {
    async fn find_by_sku_sn(&self, sn: &str) -> Result<Product, ServiceError> {
        self.catalog
            .get(sn)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("sku {sn}")))
    }
}

pub struct FakeCredits;

#[async_trait]
impl CreditService for FakeCredits {
    async fn get_credits_by_uid(&self, _uid: i64) -> Result<Credit, ServiceError> {
        Ok(Credit {
            total_amount: CREDIT_BALANCE,
        })
    }
}

/// Splits a payment the way the real service does: credits first, the
/// wallet leg takes the remainder and carries a QR code.
pub struct FakePayments {
    next_id: AtomicI64,
    payments: Mutex<HashMap<i64, Payment>>,
}

impl Default for FakePayments {
    fn default() -> Self {
        let seeded = Payment {
            id: SEEDED_PAYMENT_ID,
            sn: format!("PaymentSN-{SEEDED_PAYMENT_ID}"),
            total_amount: SEEDED_PAYMENT_AMOUNT,
            records: vec![Record {
                payment_no_3rd: "credit-33".to_string(),
                channel: ChannelType::Credit,
                amount: SEEDED_PAYMENT_AMOUNT,
                status: 0,
                wechat_code_url: String::new(),
            }],
            ..Default::default()
        };
        Self {
            next_id: AtomicI64::new(100),
            payments: Mutex::new(HashMap::from([(SEEDED_PAYMENT_ID, seeded)])),
        }
    }
}

#[async_trait]
impl PaymentService for FakePayments {
    async fn create_payment(&self, payment: Payment) -> Result<Payment, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let has_wechat = payment
            .records
            .iter()
            .any(|r| r.channel == ChannelType::Wechat);

        let mut remaining = payment.total_amount;
        let records = payment
            .records
            .iter()
            .map(|r| {
                let amount = match r.channel {
                    ChannelType::Credit if has_wechat => remaining.min(CREDIT_BALANCE),
                    _ => remaining,
                };
                remaining -= amount;
                Record {
                    payment_no_3rd: format!("{}-{id}", r.channel),
                    channel: r.channel,
                    amount,
                    status: 0,
                    wechat_code_url: match r.channel {
                        ChannelType::Wechat => format!("weixin://wxpay/bizpayurl?pr={id}"),
                        ChannelType::Credit => String::new(),
                    },
                }
            })
            .collect();

        let created = Payment {
            id,
            sn: format!("PaymentSN-{id}"),
            records,
            ..payment
        };
        self.payments
            .lock()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .insert(id, created.clone());
        Ok(created)
    }

    async fn find_payment_by_id(&self, payment_id: i64) -> Result<Payment, ServiceError> {
        self.payments
            .lock()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("payment {payment_id}")))
    }

    async fn get_payment_channels(&self) -> Result<Vec<Channel>, ServiceError> {
        Ok(vec![
            Channel {
                channel_type: ChannelType::Credit,
                desc: "credit".to_string(),
            },
            Channel {
                channel_type: ChannelType::Wechat,
                desc: "wechat".to_string(),
            },
        ])
    }
}

/// Helper harness for spinning up the application against an in-memory
/// SQLite database and fake collaborators.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<OrderRepository>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let collaborators = Collaborators {
            products: Arc::new(FakeProducts::default()),
            credits: Arc::new(FakeCredits),
            payments: Arc::new(FakePayments::default()),
        };
        let services = AppServices::new(db_arc.clone(), cache.clone(), collaborators, &cfg.order);

        let state = AppState {
            db: db_arc.clone(),
            config: cfg,
            cache,
            services,
        };
        let router = academy_order::app_router(state.clone()).expect("router builds");

        Self {
            router,
            state,
            store: Arc::new(OrderRepository::new(db_arc)),
        }
    }

    /// Send a JSON POST, with the buyer session header when `buyer` is set.
    pub async fn post_json(&self, uri: &str, body: Value, buyer: Option<i64>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(uid) = buyer {
            builder = builder.header("x-user-id", uid.to_string());
        }
        let request = builder
            .body(Body::from(
                serde_json::to_vec(&body).expect("failed to serialize json request body"),
            ))
            .expect("failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed")
    }

    /// POST as the default test buyer and decode the envelope.
    pub async fn call(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self.post_json(uri, body, Some(BUYER)).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Inserts an Unpaid order with one SKU101 line directly through the store.
    pub async fn seed_order(&self, sn: &str, buyer_id: i64, payment_id: i64, ctime: i64) -> i64 {
        self.store
            .create_order(
                NewOrder {
                    sn: sn.to_string(),
                    buyer_id,
                    payment_id,
                    payment_sn: format!("PaymentSN-{payment_id}"),
                    original_total_price: 9900,
                    real_total_price: 9900,
                    ctime,
                },
                vec![NewOrderItem {
                    spu_id: 101,
                    sku_id: 101,
                    sku_name: "SKU101".to_string(),
                    sku_description: "SKU101 desc".to_string(),
                    sku_original_price: 9900,
                    sku_real_price: 9900,
                    quantity: 1,
                }],
            )
            .await
            .expect("failed to seed order")
    }

    /// Creation timestamp `minutes` in the past.
    pub fn minutes_ago(minutes: i64) -> i64 {
        now_millis() - minutes * 60 * 1000
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Asserts the generic failure envelope.
pub fn assert_system_error(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {body}");
    assert_eq!(body["code"], 508001);
    assert_eq!(body["msg"], "system error");
    assert!(body["data"].is_null());
}
