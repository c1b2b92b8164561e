//! JSON-over-HTTP clients for the product, credit and payment services.

use crate::errors::ServiceError;
use crate::services::credit::{Credit, CreditService};
use crate::services::payment::{Channel, Payment, PaymentService};
use crate::services::product::{Product, ProductService};
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{instrument, warn};

/// Base client shared by the collaborator clients. Every call is bounded by
/// the configured timeout and is never retried here.
#[derive(Clone, Debug)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: Url,
    service: &'static str,
}

impl RemoteClient {
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build {service} client: {e}"))
            })?;
        let base_url = base_url.into();
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            ServiceError::InternalError(format!("invalid {service} service url {base_url}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InternalError(format!(
                "{service} service url {base_url} cannot take a path"
            )));
        }
        Ok(Self {
            client,
            base_url,
            service,
        })
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(format!("{} service call timed out", self.service))
        } else {
            warn!(service = self.service, error = %err, "collaborator request failed");
            ServiceError::ExternalServiceError(format!("{} service: {err}", self.service))
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        what: &str,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            warn!(service = self.service, %status, "collaborator returned an error status");
            return Err(ServiceError::ExternalServiceError(format!(
                "{} service answered {status} for {what}",
                self.service
            )));
        }
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                return self.transport_error(e);
            }
            ServiceError::ExternalServiceError(format!(
                "{} service sent an unreadable body for {what}: {e}",
                self.service
            ))
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        what: &str,
    ) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(segments))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response, what).await
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B, what: &str) -> Result<T, ServiceError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(segments))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response, what).await
    }
}

#[derive(Clone, Debug)]
pub struct HttpProductService {
    remote: RemoteClient,
}

impl HttpProductService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            remote: RemoteClient::new("product", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl ProductService for HttpProductService {
    #[instrument(skip(self))]
    async fn find_by_sku_sn(&self, sn: &str) -> Result<Product, ServiceError> {
        self.remote
            .get(&["products", "sku", sn], &format!("sku {sn}"))
            .await
    }
}

#[derive(Clone, Debug)]
pub struct HttpCreditService {
    remote: RemoteClient,
}

impl HttpCreditService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            remote: RemoteClient::new("credit", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl CreditService for HttpCreditService {
    #[instrument(skip(self))]
    async fn get_credits_by_uid(&self, uid: i64) -> Result<Credit, ServiceError> {
        let uid_segment = uid.to_string();
        self.remote
            .get(&["credits", uid_segment.as_str()], &format!("credits of user {uid}"))
            .await
    }
}

#[derive(Clone, Debug)]
pub struct HttpPaymentService {
    remote: RemoteClient,
}

impl HttpPaymentService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            remote: RemoteClient::new("payment", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PaymentService for HttpPaymentService {
    #[instrument(skip(self, payment), fields(order_sn = %payment.order_sn))]
    async fn create_payment(&self, payment: Payment) -> Result<Payment, ServiceError> {
        self.remote
            .post(
                &["payments"],
                &payment,
                &format!("payment of order {}", payment.order_sn),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn find_payment_by_id(&self, payment_id: i64) -> Result<Payment, ServiceError> {
        let id_segment = payment_id.to_string();
        self.remote
            .get(
                &["payments", id_segment.as_str()],
                &format!("payment {payment_id}"),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn get_payment_channels(&self) -> Result<Vec<Channel>, ServiceError> {
        self.remote
            .get(&["payments", "channels"], "payment channels")
            .await
    }
}
