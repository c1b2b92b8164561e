use crate::errors::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::HeaderName, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Authenticated caller, as established by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub uid: i64,
}

/// Name of the trusted header the gateway writes the buyer id into.
#[derive(Debug, Clone)]
pub struct SessionHeader(pub Arc<HeaderName>);

impl SessionHeader {
    pub fn new(name: &str) -> Result<Self, ServiceError> {
        let header = HeaderName::try_from(name.to_ascii_lowercase()).map_err(|e| {
            ServiceError::InternalError(format!("invalid session header {name}: {e}"))
        })?;
        Ok(Self(Arc::new(header)))
    }
}

/// Attaches a [`Session`] to the request when the gateway header carries a
/// positive buyer id. Requests without one pass through untouched; handlers
/// that need a buyer reject them through the [`Buyer`] extractor.
pub async fn session_middleware(
    State(header): State<SessionHeader>,
    mut request: Request,
    next: Next,
) -> Response {
    let uid = request
        .headers()
        .get(header.0.as_ref())
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|uid| *uid > 0);

    match uid {
        Some(uid) => {
            request.extensions_mut().insert(Session { uid });
        }
        None => debug!("request carries no buyer session"),
    }

    next.run(request).await
}

/// Buyer id of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buyer(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for Buyer
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .map(|session| Buyer(session.uid))
            .ok_or_else(|| ServiceError::Unauthorized("missing buyer session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(Buyer(uid): Buyer) -> String {
        uid.to_string()
    }

    fn app() -> Router {
        let header = SessionHeader::new("x-user-id").unwrap();
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                header,
                session_middleware,
            ))
    }

    #[tokio::test]
    async fn buyer_is_resolved_from_gateway_header() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header("x-user-id", "234")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"234");
    }

    #[tokio::test]
    async fn missing_or_invalid_header_is_unauthorized() {
        for value in [None, Some("abc"), Some("0"), Some("-5")] {
            let mut builder = HttpRequest::builder().uri("/");
            if let Some(v) = value {
                builder = builder.header("x-user-id", v);
            }
            let response = app()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
