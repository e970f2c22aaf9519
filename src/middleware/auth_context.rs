use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::AppState;
use crate::session::Session;

/// Resolves `Authorization: Bearer <token>` into a [`Session`].
///
/// A missing, malformed, expired or revoked token yields an anonymous
/// session; the service being called decides whether that is enough.
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let Ok(TypedHeader(authz)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
            else {
                return Ok(Session::anonymous());
            };

            let identity = state.identity.resolve(authz.token()).await?;
            Ok(identity.map_or_else(Session::anonymous, Session::authenticated))
        }
    }
}
