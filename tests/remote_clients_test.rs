//! HTTP collaborator clients against a mock server.

use std::time::Duration;

use academy_order::errors::ServiceError;
use academy_order::services::{
    credit::CreditService,
    payment::{ChannelType, Payment, PaymentService, Record},
    product::ProductService,
    remote::{HttpCreditService, HttpPaymentService, HttpProductService},
};
use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_millis(500);

fn sku_json() -> serde_json::Value {
    json!({
        "spu": {"id": 100, "sn": "SPUSN100", "name": "SPU100", "desc": "", "status": 2},
        "sku": {
            "id": 100, "sn": "SKU100", "name": "SKU100", "desc": "",
            "price": 990, "stock": 10, "sale_type": 1, "status": 2
        }
    })
}

#[tokio::test]
async fn product_lookup_decodes_spu_and_sku() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/sku/SKU100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sku_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpProductService::new(server.uri(), TIMEOUT).unwrap();
    let product = client.find_by_sku_sn("SKU100").await.unwrap();

    assert_eq!(product.sku.price, 990);
    assert_eq!(product.sku.stock_limit, 0);
    assert!(product.is_on_shelf());
}

#[tokio::test]
async fn sku_serial_is_sent_as_a_single_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/sku/A%2FB%3Fx%23y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sku_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpProductService::new(server.uri(), TIMEOUT).unwrap();
    assert!(client.find_by_sku_sn("A/B?x#y").await.is_ok());
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/credits/234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total_amount": 1000})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCreditService::new(format!("{}/api/", server.uri()), TIMEOUT).unwrap();
    assert_eq!(client.get_credits_by_uid(234).await.unwrap().total_amount, 1000);
}

#[test]
fn malformed_base_url_is_rejected() {
    assert_matches!(
        HttpProductService::new("not a url", TIMEOUT),
        Err(ServiceError::InternalError(_))
    );
}

#[tokio::test]
async fn missing_sku_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/sku/SKU404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpProductService::new(server.uri(), TIMEOUT).unwrap();
    assert_matches!(
        client.find_by_sku_sn("SKU404").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn server_errors_are_external_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/credits/234"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpCreditService::new(server.uri(), TIMEOUT).unwrap();
    assert_matches!(
        client.get_credits_by_uid(234).await,
        Err(ServiceError::ExternalServiceError(_))
    );
}

#[tokio::test]
async fn slow_collaborator_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/credits/234"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"total_amount": 1000}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = HttpCreditService::new(server.uri(), TIMEOUT).unwrap();
    assert_matches!(
        client.get_credits_by_uid(234).await,
        Err(ServiceError::Timeout(_))
    );
}

#[tokio::test]
async fn payment_is_created_with_requested_channels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(body_partial_json(json!({
            "order_sn": "order-1",
            "total_amount": 990,
            "records": [{"channel": 1, "amount": 0}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "sn": "PaymentSN-7",
            "order_sn": "order-1",
            "total_amount": 990,
            "pay_ddl": 1,
            "records": [{"channel": 1, "amount": 990}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpPaymentService::new(server.uri(), TIMEOUT).unwrap();
    let created = client
        .create_payment(Payment {
            order_sn: "order-1".to_string(),
            total_amount: 990,
            pay_ddl: 1,
            records: vec![Record {
                payment_no_3rd: String::new(),
                channel: ChannelType::Credit,
                amount: 0,
                status: 0,
                wechat_code_url: String::new(),
            }],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(created.id, 7);
    assert_eq!(created.records_total().unwrap(), 990);
}

#[tokio::test]
async fn unknown_channel_codes_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/channels"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"type": 9, "desc": "cash"}])),
        )
        .mount(&server)
        .await;

    let client = HttpPaymentService::new(server.uri(), TIMEOUT).unwrap();
    assert_matches!(
        client.get_payment_channels().await,
        Err(ServiceError::ExternalServiceError(_))
    );
}
