//! Admin login

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use papervault_common::{
    auth::verify_password,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(length(min = 1, max = 200))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Exchange admin credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let user = state.repo.find_user_by_username(&request.username).await?;
    let authenticated = user
        .as_ref()
        .is_some_and(|u| verify_password(&request.password, &u.password_hash));

    if !authenticated {
        tracing::warn!(username = %request.username, "Failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.generate_token(&request.username)?;
    tracing::info!(username = %request.username, "Admin logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expiration_secs(),
    }))
}
