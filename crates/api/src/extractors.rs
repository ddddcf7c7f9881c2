//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use kosh_shared::AppError;
use serde::de::DeserializeOwned;

use crate::ApiError;

/// Header naming the user performing the request.
pub const ACTOR_HEADER: &str = "x-actor";

/// The acting user, taken from the `x-actor` header.
///
/// ```ignore
/// async fn handler(actor: Actor) -> impl IntoResponse {
///     service.create_session(&name, actor.name()).await
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    /// Returns the actor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| Self(name.to_string()))
            .ok_or_else(|| {
                AppError::Unauthorized(format!("{ACTOR_HEADER} header is required")).into()
            })
    }
}

/// A JSON request body whose rejections use the API error envelope.
///
/// A malformed body, a missing field or an unknown enum value such as
/// `"fee_type": "hostel"` becomes a 400 `VALIDATION_ERROR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text()).into()),
        }
    }
}
