use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use luct_types::api::{Claims, SessionUser};

pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Issues and verifies HS256 access tokens. Stateless: there is no
/// revocation list, so a token stays valid until it expires.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &SessionUser) -> Result<String> {
        let exp = Utc::now()
            .checked_add_signed(self.ttl)
            .context("Token expiry out of range")?
            .timestamp() as usize;

        self.sign(&Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            name: user.name.clone(),
            exp,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .context("Invalid or expired token")?;

        debug!("Verified token for {} ({})", data.claims.username, data.claims.role);
        Ok(data.claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding).context("Failed to sign token")
    }
}
