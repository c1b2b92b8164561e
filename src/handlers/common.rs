use crate::errors::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that has been deserialized and validated. Malformed bodies are
/// reported as [`ServiceError::InvalidInput`] so they share the error envelope
/// of every other failure.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))?;
        validate_input(&value)?;
        Ok(ValidatedJson(value))
    }
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}
