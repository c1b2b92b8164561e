//! Academy order library
//!
//! Order lifecycle and payment composition for the course shop: order
//! preview and creation, status and detail queries, buyer-side completion
//! and cancellation, and the timeout sweep that expires stale unpaid orders.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

use crate::cache::CacheBackend;
use crate::middleware_helpers::session::{session_middleware, SessionHeader};

/// Code carried by every successful envelope.
pub const OK_CODE: i32 = 0;
pub const OK_MSG: &str = "OK";

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub cache: Arc<dyn CacheBackend>,
    pub services: handlers::AppServices,
}

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: OK_CODE,
            msg: OK_MSG.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload; `data` renders as null.
    pub fn ok() -> Self {
        Self {
            code: OK_CODE,
            msg: OK_MSG.to_string(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Order endpoints. Every route is a POST with a JSON body.
pub fn order_routes() -> Router<AppState> {
    use handlers::orders;

    Router::new()
        .route("/order/preview", post(orders::preview_order))
        .route("/order/create", post(orders::create_order))
        .route("/order", post(orders::retrieve_order_status))
        .route("/order/detail", post(orders::retrieve_order_detail))
        .route("/order/list", post(orders::list_orders))
        .route("/order/complete", post(orders::complete_order))
        .route("/order/cancel", post(orders::cancel_order))
        .route("/order/close", post(orders::close_timeout_orders))
}

/// Full application router with its middleware stack.
///
/// Layer order, outermost first: request id, HTTP tracing, request timeout,
/// buyer session.
pub fn app_router(state: AppState) -> Result<Router, errors::ServiceError> {
    let session_header = SessionHeader::new(&state.config.session_header)?;
    let request_timeout = state.config.request_timeout();

    let router = Router::new()
        .merge(order_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(axum::middleware::from_fn_with_state(
            session_header,
            session_middleware,
        ))
        .layer(TimeoutLayer::new(request_timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state);

    Ok(router)
}
