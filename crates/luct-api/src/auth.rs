use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rand_core::OsRng;
use tracing::{error, info, warn};

use luct_db::{CreateUserOutcome, Database};
use luct_types::Role;
use luct_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SessionUser};

use crate::error::ApiError;
use crate::extract::ApiJson;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: crate::token::TokenIssuer,
}

/// Run blocking DB work (and password hashing) off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {}", e)))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if [&req.username, &req.password, &req.role, &req.name]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::Validation(
            "username, password, role and name are required".into(),
        ));
    }

    let role: Role = req
        .role
        .parse()
        .map_err(|_| ApiError::Validation("Invalid role".into()))?;

    let username = req.username.trim().to_string();
    let name = req.name.trim().to_string();
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    let password = req.password;

    let outcome = run_blocking(&state, move |db| {
        let password_hash = hash_password(&password)?;
        Ok(db.create_user(&username, &password_hash, role, &name, email.as_deref())?)
    })
    .await?;

    match outcome {
        CreateUserOutcome::Created(user_id) => Ok((
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: "User registered".into(),
                user_id,
            }),
        )),
        CreateUserOutcome::UsernameTaken => {
            Err(ApiError::Conflict("Username already exists".into()))
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Usernames are stored trimmed by register.
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("username & password required".into()));
    }

    let attempted = username.clone();
    let user = run_blocking(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Err(ApiError::InvalidCredentials);
        };

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(anyhow!("stored hash for user {} unreadable: {}", user.id, e)))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::InvalidCredentials)?;

        Ok(user)
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::InvalidCredentials) {
            warn!("Failed login for '{}'", attempted);
        }
    })?;

    let role: Role = user
        .role
        .parse()
        .map_err(|e| ApiError::Internal(anyhow!("user {}: {}", user.id, e)))?;

    let session = SessionUser {
        id: user.id,
        username: user.username,
        role,
        name: user.name,
        email: user.email,
    };
    let token = state.tokens.issue(&session)?;

    info!("{} logged in as {}", session.username, session.role);
    Ok(Json(LoginResponse { token, user: session }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies_and_salts_differ() {
        let first = hash_password("pw").unwrap();
        let second = hash_password("pw").unwrap();
        assert_ne!(first, second);

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default().verify_password(b"pw", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"nope", &parsed).is_err());
    }
}
