//! Accounts and bearer tokens. An account's UUID is the identity the
//! registry sees as capsule owner.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use chronos_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::AppState;
use crate::error::{ApiError, blocking};
use crate::extract::ApiJson;

const TOKEN_TTL_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(3..=32).contains(&req.username.len()) {
        return Err(ApiError::InvalidInput("username must be 3-32 bytes"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::InvalidInput("password must be at least 8 bytes"));
    }

    let db_state = state.clone();
    let username = req.username.clone();
    let user_id = blocking(move || {
        let db = &db_state.db;
        let taken = db.get_user_by_username(&username).map_err(internal)?.is_some();
        if taken {
            return Err(ApiError::UsernameTaken);
        }

        // Argon2id with a fresh salt
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                ApiError::Internal
            })?
            .to_string();

        // A concurrent registration can claim the name while we hash.
        let user_id = Uuid::new_v4();
        let created = db
            .create_user(&user_id.to_string(), &username, &password_hash)
            .map_err(internal)?;
        if !created {
            return Err(ApiError::UsernameTaken);
        }
        Ok(user_id)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &req.username)?;
    info!("Registered {} ({})", req.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db_state = state.clone();
    let username = req.username.clone();
    let user = blocking(move || {
        let user = db_state
            .db
            .get_user_by_username(&username)
            .map_err(internal)?
            .ok_or(ApiError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
            error!("Stored hash for {} is unreadable: {}", user.username, e);
            ApiError::Internal
        })?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| {
                warn!("Failed login for {}", user.username);
                ApiError::Unauthorized
            })?;

        Ok::<_, ApiError>(user)
    })
    .await?;

    let user_id: Uuid = user.id.parse().map_err(|e| {
        error!("Corrupt user id '{}': {}", user.id, e);
        ApiError::Internal
    })?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}

fn internal(e: anyhow::Error) -> ApiError {
    error!("Account store error: {:#}", e);
    ApiError::Internal
}
