use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::extract::RequiredFields;

fn default_active() -> bool {
    true
}

fn default_limit() -> u64 {
    100
}

/// Request body for `POST /api/users/`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl RequiredFields for CreateUserRequest {
    const REQUIRED: &'static [&'static str] = &["username", "email", "password"];
}

/// Request body for `PUT /api/users/{id}`. Absent (or null) fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: Option<String>,
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

impl RequiredFields for UpdateUserRequest {}

/// User as returned to clients. Carries no password material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Number of users to skip.
    #[serde(default)]
    pub skip: u64,
    /// Maximum number of users to return.
    #[serde(default = "default_limit")]
    #[validate(range(max = 1000, message = "limit must be at most 1000"))]
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}
