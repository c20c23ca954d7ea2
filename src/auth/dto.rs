use serde::{Deserialize, Serialize};

use super::repo_types::{PublicUser, UserView};

/// Request body for signup. Missing fields deserialize as empty and are reported by validation.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserPayload<U: Serialize> {
    pub user: U,
}

pub type SignupResponse = UserPayload<PublicUser>;
pub type LoginResponse = UserPayload<UserView>;
