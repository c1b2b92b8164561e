use crate::entities::now_millis;
use crate::errors::ServiceError;
use crate::services::payment::{Channel, ChannelType, Payment, PaymentService, Record};
use crate::services::with_deadline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, instrument};

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// Per-channel share of a payment as shown to the buyer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSummary {
    pub channel: ChannelType,
    pub amount: i64,
    pub wechat_code_url: String,
}

impl From<&Record> for ChannelSummary {
    fn from(record: &Record) -> Self {
        Self {
            channel: record.channel,
            amount: record.amount,
            wechat_code_url: record.wechat_code_url.clone(),
        }
    }
}

/// Payment created for a new order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedPayment {
    pub payment_id: i64,
    pub payment_sn: String,
    pub channels: Vec<ChannelSummary>,
}

impl ComposedPayment {
    /// QR payload of the wallet leg; empty when the payment has none.
    pub fn wechat_code_url(&self) -> String {
        self.channels
            .iter()
            .find(|c| c.channel == ChannelType::Wechat)
            .map(|c| c.wechat_code_url.clone())
            .unwrap_or_default()
    }
}

/// Parses requested channel codes, keeping their order. Empty lists, unknown
/// codes and repeated channels are rejected.
pub fn parse_channels(codes: &[i64]) -> Result<Vec<ChannelType>, ServiceError> {
    if codes.is_empty() {
        return Err(ServiceError::InvalidPaymentChannel(
            "no payment channel requested".to_string(),
        ));
    }
    let mut channels = Vec::with_capacity(codes.len());
    for &code in codes {
        let channel = ChannelType::try_from(code)?;
        if channels.contains(&channel) {
            return Err(ServiceError::InvalidPaymentChannel(format!(
                "channel {channel} requested twice"
            )));
        }
        channels.push(channel);
    }
    Ok(channels)
}

/// Turns a channel preference list into a payment at the payment service.
/// How the amount is split across channels is decided by that service.
#[derive(Clone)]
pub struct PaymentComposer {
    payments: Arc<dyn PaymentService>,
    timeout: Duration,
    deadline_minutes: i64,
}

impl PaymentComposer {
    pub fn new(payments: Arc<dyn PaymentService>, timeout: Duration, deadline_minutes: i64) -> Self {
        Self {
            payments,
            timeout,
            deadline_minutes,
        }
    }

    #[instrument(skip(self, channels), fields(channels = channels.len()))]
    pub async fn compose(
        &self,
        order_sn: &str,
        total_amount: i64,
        channels: &[ChannelType],
    ) -> Result<ComposedPayment, ServiceError> {
        if channels.is_empty() {
            return Err(ServiceError::InvalidPaymentChannel(
                "no payment channel requested".to_string(),
            ));
        }

        let request = Payment {
            order_sn: order_sn.to_string(),
            total_amount,
            pay_ddl: now_millis() + self.deadline_minutes * MILLIS_PER_MINUTE,
            records: channels
                .iter()
                .map(|&channel| Record {
                    payment_no_3rd: String::new(),
                    channel,
                    amount: 0,
                    status: 0,
                    wechat_code_url: String::new(),
                })
                .collect(),
            ..Default::default()
        };

        let payment = with_deadline(
            "payment service",
            self.timeout,
            self.payments.create_payment(request),
        )
        .await?;

        let recorded = payment.records_total()?;
        if payment.records.is_empty() || recorded != total_amount {
            error!(
                payment_id = payment.id,
                expected = total_amount,
                recorded,
                "payment records do not cover the order total"
            );
            return Err(ServiceError::ExternalServiceError(format!(
                "payment {} records sum to {} instead of {}",
                payment.sn, recorded, total_amount
            )));
        }

        Ok(ComposedPayment {
            payment_id: payment.id,
            payment_sn: payment.sn.clone(),
            channels: payment.records.iter().map(ChannelSummary::from).collect(),
        })
    }

    pub async fn available_channels(&self) -> Result<Vec<Channel>, ServiceError> {
        with_deadline(
            "payment service",
            self.timeout,
            self.payments.get_payment_channels(),
        )
        .await
    }

    /// Channel breakdown of an existing payment.
    #[instrument(skip(self))]
    pub async fn channel_summaries(
        &self,
        payment_id: i64,
    ) -> Result<Vec<ChannelSummary>, ServiceError> {
        let payment = with_deadline(
            "payment service",
            self.timeout,
            self.payments.find_payment_by_id(payment_id),
        )
        .await?;
        Ok(payment.records.iter().map(ChannelSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payment::MockPaymentService;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn record(channel: ChannelType, amount: i64, code: &str) -> Record {
        Record {
            payment_no_3rd: format!("{channel}-1"),
            channel,
            amount,
            status: 0,
            wechat_code_url: code.to_string(),
        }
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0])]
    #[case(vec![1, 3])]
    #[case(vec![2, 2])]
    fn invalid_channel_lists_are_rejected(#[case] codes: Vec<i64>) {
        assert_matches!(
            parse_channels(&codes),
            Err(ServiceError::InvalidPaymentChannel(_))
        );
    }

    #[test]
    fn channel_order_is_kept() {
        assert_eq!(
            parse_channels(&[2, 1]).unwrap(),
            vec![ChannelType::Wechat, ChannelType::Credit]
        );
    }

    #[tokio::test]
    async fn compose_forwards_preferences_and_maps_records() {
        let mut payments = MockPaymentService::new();
        payments
            .expect_create_payment()
            .withf(|p| {
                p.order_sn == "order-1"
                    && p.total_amount == 9900
                    && p.records.iter().map(|r| r.channel).collect::<Vec<_>>()
                        == vec![ChannelType::Credit, ChannelType::Wechat]
            })
            .times(1)
            .returning(|p| {
                Ok(Payment {
                    id: 2,
                    sn: "PaymentSN-2".to_string(),
                    records: vec![
                        record(ChannelType::Credit, 1000, ""),
                        record(ChannelType::Wechat, 8900, "wechat_code"),
                    ],
                    ..p
                })
            });

        let composer = PaymentComposer::new(Arc::new(payments), Duration::from_secs(1), 30);
        let composed = composer
            .compose("order-1", 9900, &[ChannelType::Credit, ChannelType::Wechat])
            .await
            .unwrap();

        assert_eq!(composed.payment_sn, "PaymentSN-2");
        assert_eq!(composed.wechat_code_url(), "wechat_code");
        assert_eq!(composed.channels.len(), 2);
    }

    #[tokio::test]
    async fn records_must_cover_the_total() {
        let mut payments = MockPaymentService::new();
        payments.expect_create_payment().returning(|p| {
            Ok(Payment {
                id: 3,
                sn: "PaymentSN-3".to_string(),
                records: vec![record(ChannelType::Credit, 10, "")],
                ..p
            })
        });

        let composer = PaymentComposer::new(Arc::new(payments), Duration::from_secs(1), 30);
        let result = composer.compose("order-2", 990, &[ChannelType::Credit]).await;
        assert_matches!(result, Err(ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn overflowing_record_amounts_are_rejected() {
        let mut payments = MockPaymentService::new();
        payments.expect_create_payment().returning(|p| {
            Ok(Payment {
                id: 4,
                sn: "PaymentSN-4".to_string(),
                records: vec![
                    record(ChannelType::Credit, i64::MAX, ""),
                    record(ChannelType::Wechat, 1, "wechat_code"),
                ],
                ..p
            })
        });

        let composer = PaymentComposer::new(Arc::new(payments), Duration::from_secs(1), 30);
        let result = composer
            .compose("order-4", 990, &[ChannelType::Credit, ChannelType::Wechat])
            .await;
        assert_matches!(result, Err(ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn credit_only_payment_has_no_code_url() {
        let mut payments = MockPaymentService::new();
        payments.expect_create_payment().returning(|p| {
            Ok(Payment {
                id: 1,
                sn: "PaymentSN-1".to_string(),
                records: vec![record(ChannelType::Credit, p.total_amount, "")],
                ..p
            })
        });

        let composer = PaymentComposer::new(Arc::new(payments), Duration::from_secs(1), 30);
        let composed = composer
            .compose("order-3", 990, &[ChannelType::Credit, ChannelType::Wechat])
            .await
            .unwrap();
        assert_eq!(composed.wechat_code_url(), "");
    }
}
