//! Secret provider for the attendance token HMAC key.
//!
//! The key is read from `MESS_TOKEN_SECRET` (typically set in `.env`). Rotation is
//! handled outside this crate.

use crate::errors::{Error, Result};

/// Environment variable holding the token signing key.
pub const TOKEN_SECRET_ENV: &str = "MESS_TOKEN_SECRET";

/// Supplies the HMAC key used to sign attendance tokens.
pub trait SecretProvider: Send + Sync {
    /// Returns the current signing key.
    fn token_secret(&self) -> Result<Vec<u8>>;
}

/// Reads the key from the environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn token_secret(&self) -> Result<Vec<u8>> {
        let secret = std::env::var(TOKEN_SECRET_ENV).map_err(|e| Error::Config {
            message: format!("{TOKEN_SECRET_ENV} not available: {e}"),
        })?;
        if secret.is_empty() {
            return Err(Error::Config {
                message: format!("{TOKEN_SECRET_ENV} is empty"),
            });
        }
        Ok(secret.into_bytes())
    }
}

/// Fixed key, for tests and embedded callers that manage secrets themselves.
#[derive(Clone)]
pub struct StaticSecret(Vec<u8>);

impl StaticSecret {
    /// Wraps a key.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

impl std::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticSecret(..)")
    }
}

impl SecretProvider for StaticSecret {
    fn token_secret(&self) -> Result<Vec<u8>> {
        if self.0.is_empty() {
            return Err(Error::Config {
                message: "token secret is empty".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}
