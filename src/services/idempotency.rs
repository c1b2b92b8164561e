use crate::cache::CacheBackend;
use crate::errors::ServiceError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A claimed create-order request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestClaim {
    key: String,
}

/// Rejects a second create-order request carrying the same buyer-scoped
/// request id while the first claim is alive.
#[derive(Clone)]
pub struct RequestGuard {
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl RequestGuard {
    pub fn new(cache: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(buyer_id: i64, request_id: &str) -> String {
        format!("order:create:{buyer_id}:{request_id}")
    }

    pub async fn claim(&self, buyer_id: i64, request_id: &str) -> Result<RequestClaim, ServiceError> {
        let request_id = request_id.trim();
        if request_id.is_empty() {
            return Err(ServiceError::InvalidInput("request id is empty".to_string()));
        }

        let key = Self::key(buyer_id, request_id);
        let claimed = self.cache.set_if_absent(&key, "1", self.ttl).await?;
        if !claimed {
            debug!(buyer_id, request_id, "duplicate create-order request");
            return Err(ServiceError::DuplicateRequest(request_id.to_string()));
        }
        Ok(RequestClaim { key })
    }

    /// Frees a claim whose order was never persisted so the client can retry.
    pub async fn release(&self, claim: RequestClaim) {
        if let Err(e) = self.cache.delete(&claim.key).await {
            warn!(key = %claim.key, error = %e, "failed to release request id claim");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use assert_matches::assert_matches;

    fn guard() -> RequestGuard {
        RequestGuard::new(Arc::new(InMemoryCache::new()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn claim_is_stored_under_buyer_scoped_key() {
        let cache = Arc::new(InMemoryCache::new());
        let guard = RequestGuard::new(cache.clone(), Duration::from_secs(60));
        guard.claim(1, " req-1 ").await.unwrap();
        assert_eq!(
            cache.get("order:create:1:req-1").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn second_claim_is_a_duplicate() {
        let guard = guard();
        guard.claim(1, "req-1").await.unwrap();
        assert_matches!(
            guard.claim(1, "req-1").await,
            Err(ServiceError::DuplicateRequest(_))
        );
    }

    #[tokio::test]
    async fn claims_are_scoped_per_buyer() {
        let guard = guard();
        guard.claim(1, "req-1").await.unwrap();
        assert!(guard.claim(2, "req-1").await.is_ok());
    }

    #[tokio::test]
    async fn released_claim_can_be_taken_again() {
        let guard = guard();
        let claim = guard.claim(1, "req-2").await.unwrap();
        guard.release(claim).await;
        assert!(guard.claim(1, "req-2").await.is_ok());
    }

    #[tokio::test]
    async fn blank_request_id_is_invalid() {
        assert_matches!(
            guard().claim(1, "  ").await,
            Err(ServiceError::InvalidInput(_))
        );
    }
}
