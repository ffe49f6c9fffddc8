use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use luct_types::Role;
use luct_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and verify the bearer token, then stash the claims in the request
/// extensions for the role gates and handlers behind it.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::MissingToken)?;

    let claims = state
        .tokens
        .verify(bearer.token())
        .map_err(|_| ApiError::InvalidToken)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Route-level role gate. Must sit inside `require_auth`.
pub async fn role_gate(
    State(allowed): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(ApiError::MissingToken)?;

    require_role(claims, allowed)?;
    Ok(next.run(req).await)
}

pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        debug!("{} ({}) denied; needs one of {:?}", claims.username, claims.role, allowed);
        Err(ApiError::Forbidden)
    }
}

/// Admins may act on any account; everyone else only on their own.
pub fn require_owner_or_admin(claims: &Claims, owner_id: i64) -> Result<(), ApiError> {
    if claims.role == Role::Admin || claims.sub == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
