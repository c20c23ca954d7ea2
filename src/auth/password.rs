use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// Argon2 is deliberately slow; keep it off the async workers.

pub async fn hash_password_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task panicked")?
}

pub async fn verify_password_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let a = hash_password("Secret123").unwrap();
        let b = hash_password("Secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn blocking_wrappers_reject_wrong_password() {
        let hash = hash_password_blocking("correct-horse".into()).await.unwrap();
        assert!(!verify_password_blocking("wrong-horse".into(), hash).await.unwrap());
    }
}
