use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, error::AppError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing signing secret for {0:?} tokens")]
    MissingSecret(TokenKind),
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("{0:?} token lifetime overflows the clock")]
    Lifetime(TokenKind),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret(_) | TokenError::Lifetime(_) => {
                AppError::Configuration(err.to_string())
            }
            TokenError::Invalid(_) => AppError::Unauthenticated("Invalid or expired token"),
            TokenError::Signing(_) => AppError::Internal(err.into()),
        }
    }
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }
}

/// Issues and verifies access/refresh JWTs, each kind with its own secret and lifetime.
#[derive(Clone)]
pub struct TokenService {
    access: Option<SigningKeys>,
    refresh: Option<SigningKeys>,
}

fn ttl_days(days: i64) -> Duration {
    Duration::seconds(days.saturating_mul(86_400))
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            access: SigningKeys::new(&cfg.access_secret, ttl_days(cfg.access_ttl_days)),
            refresh: SigningKeys::new(&cfg.refresh_secret, ttl_days(cfg.refresh_ttl_days)),
        }
    }

    fn keys(&self, kind: TokenKind) -> Result<&SigningKeys, TokenError> {
        match kind {
            TokenKind::Access => self.access.as_ref(),
            TokenKind::Refresh => self.refresh.as_ref(),
        }
        .ok_or(TokenError::MissingSecret(kind))
    }

    pub fn issue(&self, kind: TokenKind, user_id: i64) -> Result<String, TokenError> {
        let keys = self.keys(kind)?;
        let now = OffsetDateTime::now_utc();
        let exp = now
            .checked_add(keys.ttl)
            .ok_or(TokenError::Lifetime(kind))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            kind,
        };
        let token =
            encode(&Header::default(), &claims, &keys.encoding).map_err(TokenError::Signing)?;
        debug!(user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(TokenKind::Access, user_id)?,
            refresh: self.issue(TokenKind::Refresh, user_id)?,
        })
    }

    /// Verifies an access token.
    pub fn verify(&self, token: &str) -> Result<TokenSubject, TokenError> {
        self.verify_kind(TokenKind::Access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<TokenSubject, TokenError> {
        self.verify_kind(TokenKind::Refresh, token)
    }

    fn verify_kind(&self, kind: TokenKind, token: &str) -> Result<TokenSubject, TokenError> {
        let keys = self.keys(kind)?;
        let data = decode::<Claims>(token, &keys.decoding, &Validation::default())
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        if data.claims.kind != kind {
            return Err(TokenError::Invalid(format!("expected a {kind:?} token")));
        }
        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid("malformed subject".into()))?;
        debug!(user_id, kind = ?kind, "jwt verified");
        Ok(TokenSubject { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            access_ttl_days: 7,
            refresh_ttl_days: 30,
        }
    }

    fn service() -> TokenService {
        TokenService::new(&config())
    }

    #[test]
    fn issue_and_verify_access_token() {
        let tokens = service();
        let token = tokens.issue(TokenKind::Access, 42).expect("sign access");
        assert_eq!(tokens.verify(&token).expect("verify"), TokenSubject { user_id: 42 });
    }

    #[test]
    fn issue_and_verify_refresh_token() {
        let tokens = service();
        let token = tokens.issue(TokenKind::Refresh, 7).expect("sign refresh");
        assert_eq!(tokens.verify_refresh(&token).expect("verify").user_id, 7);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let token = tokens.issue(TokenKind::Refresh, 1).expect("sign refresh");
        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn kind_claim_is_checked_even_with_shared_secret() {
        let mut cfg = config();
        cfg.refresh_secret = cfg.access_secret.clone();
        let tokens = TokenService::new(&cfg);
        let token = tokens.issue(TokenKind::Refresh, 1).expect("sign refresh");
        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = service();
        let token = tokens.issue(TokenKind::Access, 3).expect("sign access");
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(tokens.verify(&tampered), Err(TokenError::Invalid(_))));
        assert!(matches!(tokens.verify("not.a.jwt"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut other = config();
        other.access_secret = "someone-else".into();
        let token = TokenService::new(&other).issue(TokenKind::Access, 3).unwrap();
        assert!(matches!(service().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: "5".into(),
            iat: now - 7200,
            exp: now - 3600,
            kind: TokenKind::Access,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();
        assert!(matches!(service().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn oversized_lifetime_is_an_error_not_a_panic() {
        let mut cfg = config();
        cfg.access_ttl_days = 100_000_000_000;
        let err = TokenService::new(&cfg).issue(TokenKind::Access, 1).unwrap_err();
        assert!(matches!(err, TokenError::Lifetime(TokenKind::Access)));
        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }

    #[test]
    fn missing_secret_is_reported() {
        let mut cfg = config();
        cfg.access_secret.clear();
        let err = TokenService::new(&cfg).issue(TokenKind::Access, 1).unwrap_err();
        assert!(matches!(err, TokenError::MissingSecret(TokenKind::Access)));
        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }
}
