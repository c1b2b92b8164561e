use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Credit balance of a user, in credit points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub total_amount: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditService: Send + Sync {
    async fn get_credits_by_uid(&self, uid: i64) -> Result<Credit, ServiceError>;
}
