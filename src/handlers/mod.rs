pub mod common;
pub mod health;
pub mod orders;

use crate::cache::CacheBackend;
use crate::config::{CollaboratorConfig, OrderConfig};
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::repositories::{OrderRepository, OrderStore};
use crate::services::credit::CreditService;
use crate::services::idempotency::RequestGuard;
use crate::services::order_lifecycle::OrderLifecycle;
use crate::services::orders::OrderService;
use crate::services::payment::PaymentService;
use crate::services::payment_composer::PaymentComposer;
use crate::services::pricing::PricingChecker;
use crate::services::product::ProductService;
use crate::services::remote::{HttpCreditService, HttpPaymentService, HttpProductService};
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// External services the order module depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub products: Arc<dyn ProductService>,
    pub credits: Arc<dyn CreditService>,
    pub payments: Arc<dyn PaymentService>,
}

impl Collaborators {
    /// HTTP clients for the configured collaborator base URLs.
    pub fn from_config(config: &CollaboratorConfig, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            products: Arc::new(HttpProductService::new(&config.product_service_url, timeout)?),
            credits: Arc::new(HttpCreditService::new(&config.credit_service_url, timeout)?),
            payments: Arc::new(HttpPaymentService::new(&config.payment_service_url, timeout)?),
        })
    }
}

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order: Arc<OrderService>,
}

impl AppServices {
    /// Wires the order module: store, request guard, pricing, payment
    /// composition and lifecycle, in that order.
    pub fn new(
        db_pool: Arc<DbPool>,
        cache: Arc<dyn CacheBackend>,
        collaborators: Collaborators,
        config: &OrderConfig,
    ) -> Self {
        let timeout = config.collaborator_timeout();

        let store: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool));
        let guard = RequestGuard::new(cache, config.request_id_ttl());
        let pricing = PricingChecker::new(collaborators.products, timeout);
        let composer = PaymentComposer::new(
            collaborators.payments,
            timeout,
            config.payment_deadline_minutes,
        );
        let lifecycle = OrderLifecycle::new(store.clone());

        let order = Arc::new(OrderService::new(
            store,
            pricing,
            composer,
            guard,
            lifecycle,
            collaborators.credits,
            config,
        ));

        Self { order }
    }
}
