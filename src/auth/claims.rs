use serde::{Deserialize, Serialize};

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload. Only `sub`, `exp` and `kind` are trusted on verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // user ID
    pub iat: i64,        // issued at (unix timestamp)
    pub exp: i64,        // expires at (unix timestamp)
    pub kind: TokenKind, // token type
}
