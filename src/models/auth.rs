//! Authentication-related models

use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Register request (self-service, always creates a `USER`)
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Password change; `current_password` is required when changing one's own
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub current_password: Option<String>,
}

/// Current identity as seen by the request
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub username: String,
    pub role: super::user::Role,
}
