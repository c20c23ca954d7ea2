use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database. Not serializable: handlers answer with the projections below.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Minimal identity attached to gated requests and returned by signup/profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

/// Login view: the stored record minus the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}
