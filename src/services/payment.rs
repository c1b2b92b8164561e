use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment channel. Travels as its integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ChannelType {
    Credit = 1,
    Wechat = 2,
}

impl ChannelType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ChannelType {
    type Error = ServiceError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ChannelType::Credit),
            2 => Ok(ChannelType::Wechat),
            other => Err(ServiceError::InvalidPaymentChannel(format!(
                "unknown channel type {other}"
            ))),
        }
    }
}

impl From<ChannelType> for i64 {
    fn from(channel: ChannelType) -> Self {
        channel.code()
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Credit => f.write_str("credit"),
            ChannelType::Wechat => f.write_str("wechat"),
        }
    }
}

/// A channel the payment service currently offers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub desc: String,
}

/// One leg of a payment, settled through a single channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub payment_no_3rd: String,
    pub channel: ChannelType,
    pub amount: i64,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub wechat_code_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub sn: String,
    #[serde(default)]
    pub order_id: i64,
    pub order_sn: String,
    pub total_amount: i64,
    /// Unix milliseconds after which the payment can no longer be settled.
    pub pay_ddl: i64,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Payment {
    /// Sum of the record amounts. Fails when the collaborator sends amounts
    /// that overflow.
    pub fn records_total(&self) -> Result<i64, ServiceError> {
        self.records
            .iter()
            .try_fold(0i64, |total, r| total.checked_add(r.amount))
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(format!(
                    "payment {} record amounts overflow",
                    self.sn
                ))
            })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Creates a payment for `payment`. The request carries one record per
    /// requested channel in preference order; the service decides the split.
    async fn create_payment(&self, payment: Payment) -> Result<Payment, ServiceError>;

    async fn find_payment_by_id(&self, payment_id: i64) -> Result<Payment, ServiceError>;

    async fn get_payment_channels(&self) -> Result<Vec<Channel>, ServiceError>;
}
