use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CapsuleId, Identity, Timestamp};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the auth handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Capsules --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCapsuleRequest {
    pub message: String,
    pub unlock_time: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCapsuleResponse {
    pub id: CapsuleId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealCapsuleResponse {
    pub id: CapsuleId,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CanRevealResponse {
    pub id: CapsuleId,
    pub can_reveal: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalCapsulesResponse {
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserCapsulesResponse {
    pub owner: Identity,
    pub capsule_ids: Vec<CapsuleId>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
