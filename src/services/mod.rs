use crate::errors::ServiceError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

// Collaborator contracts
pub mod credit;
pub mod payment;
pub mod product;
pub mod remote;

// Order core
pub mod idempotency;
pub mod order_lifecycle;
pub mod orders;
pub mod payment_composer;
pub mod pricing;

/// Runs a collaborator call under `limit`, reporting an elapsed deadline as
/// [`ServiceError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    collaborator: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(collaborator, timeout_ms = limit.as_millis() as u64, "collaborator call timed out");
            Err(ServiceError::Timeout(format!(
                "{collaborator} did not answer within {}ms",
                limit.as_millis()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn slow_call_times_out() {
        let result: Result<(), _> = with_deadline("product", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert_matches!(result, Err(ServiceError::Timeout(_)));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = with_deadline("credit", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
