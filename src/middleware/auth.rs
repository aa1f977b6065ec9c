//! Caller identity.
//!
//! Authentication happens upstream; the authenticating proxy forwards the
//! resolved user id in `x-user-id`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::validation::validate_id;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        validate_id("x-user-id", raw).map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(ActorId(raw.to_string()))
    }
}
