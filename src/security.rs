use std::collections::HashMap;

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tracing::debug;

/// Credential check consulted once per connection, after the startup packet.
pub trait Authenticator: Send + Sync {
    /// Whether the server must ask for a cleartext password.
    fn requires_password(&self) -> bool;
    /// `Ok(false)` is a rejected credential; `Err` is a failure of the credential store.
    fn authenticate(&self, user: &str, credential: &str) -> Result<bool>;
}

/// Accepts every user without a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustAuthenticator;

impl Authenticator for TrustAuthenticator {
    fn requires_password(&self) -> bool { false }
    fn authenticate(&self, _user: &str, _credential: &str) -> Result<bool> { Ok(true) }
}

/// Users with argon2 password hashes (PHC strings).
#[derive(Debug, Clone, Default)]
pub struct PasswordAuthenticator {
    users: HashMap<String, String>,
}

impl PasswordAuthenticator {
    pub fn new() -> Self { Self::default() }

    /// Register `user` with a plaintext password, or with an existing PHC hash
    /// when `secret` already is one.
    pub fn add_user(&mut self, user: &str, secret: &str) -> Result<()> {
        let phc = if is_phc_hash(secret) {
            PasswordHash::new(secret).map_err(|e| anyhow!("invalid password hash for '{}': {}", user, e))?;
            secret.to_string()
        } else {
            hash_password(secret)?
        };
        self.users.insert(user.to_string(), phc);
        Ok(())
    }

    pub fn with_user(mut self, user: &str, secret: &str) -> Result<Self> {
        self.add_user(user, secret)?;
        Ok(self)
    }

    pub fn user_count(&self) -> usize { self.users.len() }
}

impl Authenticator for PasswordAuthenticator {
    fn requires_password(&self) -> bool { true }

    fn authenticate(&self, user: &str, credential: &str) -> Result<bool> {
        match self.users.get(user) {
            Some(hash) => Ok(verify_password(hash, credential)),
            None => {
                debug!(target: "pgwire", "authenticate: unknown user '{}'", user);
                Ok(false)
            }
        }
    }
}

fn is_phc_hash(s: &str) -> bool { s.starts_with("$argon2") }

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_accepts_anyone() {
        let a = TrustAuthenticator;
        assert!(!a.requires_password());
        assert!(a.authenticate("whoever", "").unwrap());
    }

    #[test]
    fn password_roundtrip_and_rejections() {
        let a = PasswordAuthenticator::new().with_user("alice", "s3cret").unwrap();
        assert!(a.requires_password());
        assert!(a.authenticate("alice", "s3cret").unwrap());
        assert!(!a.authenticate("alice", "wrong").unwrap());
        assert!(!a.authenticate("mallory", "s3cret").unwrap());
    }

    #[test]
    fn accepts_precomputed_phc_hash() {
        let phc = hash_password("pw").unwrap();
        let a = PasswordAuthenticator::new().with_user("bob", &phc).unwrap();
        assert!(a.authenticate("bob", "pw").unwrap());
        assert!(PasswordAuthenticator::new().with_user("bob", "$argon2id$garbage").is_err());
    }
}
