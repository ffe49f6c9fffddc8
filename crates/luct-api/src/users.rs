use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use luct_db::{DeleteOutcome, UserChanges};
use luct_types::Role;
use luct_types::api::{Claims, MessageResponse, UpdateUserRequest};

use crate::auth::{AppState, hash_password, run_blocking};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, parse_id};
use crate::middleware::{require_owner_or_admin, require_role};

/// GET /users/{role} — admins list any role, everyone else only their own.
pub async fn list_users(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let role: Role = role
        .parse()
        .map_err(|_| ApiError::Validation("Invalid role".into()))?;

    if claims.role != Role::Admin && claims.role != role {
        return Err(ApiError::Forbidden);
    }

    let users = run_blocking(&state, move |db| {
        db.list_users_by_role(role)?
            .into_iter()
            .map(|row| convert::user(row, None).map_err(ApiError::from))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    require_owner_or_admin(&claims, id)?;

    let user = load_user(&state, id).await?;
    Ok(Json(user))
}

/// GET /profile — the caller's own record with its role profile.
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    require_owner_or_admin(&claims, id)?;

    // Blank values are treated as "not provided".
    let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let name = present(req.name);
    let email = present(req.email);
    let password = req.password.filter(|p| !p.is_empty());

    if name.is_none() && email.is_none() && password.is_none() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    let updated = run_blocking(&state, move |db| {
        let password_hash = password.as_deref().map(hash_password).transpose()?;
        let changes = UserChanges {
            name: name.as_deref(),
            email: email.as_deref(),
            password_hash: password_hash.as_deref(),
        };
        Ok(db.update_user(id, &changes)?)
    })
    .await?;

    if !updated {
        return Err(ApiError::NotFound("User not found"));
    }

    info!("User {} updated by {}", id, claims.username);
    Ok(Json(MessageResponse::new("User updated")))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let id = parse_id(&id)?;

    let outcome = run_blocking(&state, move |db| Ok(db.delete_user(id)?)).await?;

    match outcome {
        DeleteOutcome::Deleted => {
            info!("User {} deleted by {}", id, claims.username);
            Ok(Json(MessageResponse::new("User deleted")))
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound("User not found")),
        DeleteOutcome::StillReferenced => Err(ApiError::Validation(
            "User still owns classes or reports".into(),
        )),
    }
}

async fn load_user(state: &AppState, id: i64) -> Result<luct_types::User, ApiError> {
    run_blocking(state, move |db| {
        let Some(row) = db.get_user_by_id(id)? else {
            return Err(ApiError::NotFound("User not found"));
        };
        let role: Option<Role> = row.role.parse().ok();
        let profile = match role {
            Some(role) => db.get_profile(id, role)?,
            None => None,
        };
        Ok(convert::user(row, profile)?)
    })
    .await
}
