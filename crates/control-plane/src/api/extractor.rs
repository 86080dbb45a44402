//! The bearer-token extractor: every authenticated handler takes a
//! [`AuthContext`] parameter and axum resolves it from the `Authorization`
//! header before the handler body runs (§4.6/§6).

use crate::auth::{verify_token, RequestContext};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

pub struct AuthContext(pub RequestContext);

impl std::ops::Deref for AuthContext {
    type Target = RequestContext;
    fn deref(&self) -> &RequestContext {
        &self.0
    }
}

impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthenticated)?;
        verify_token(&state.config.jwt_secret, token).map(AuthContext)
    }
}
