use crate::error::CollectionError;
use crate::models::UserId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId", alias = "sub")]
    user_id: String,
    exp: usize,
    #[serde(default)]
    iat: usize,
}

/// Resolves bearer credentials to user ids. Tokens are HS256 JWTs carrying
/// a `userId` claim.
pub struct Identity {
    secret: Vec<u8>,
    validation: Validation,
    token_ttl: Duration,
}

impl Identity {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        Identity {
            secret: secret.as_bytes().to_vec(),
            validation: Validation::default(),
            token_ttl,
        }
    }

    pub fn create_token(&self, user_id: &UserId) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.as_str().to_string(),
            exp: (now + self.token_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
    }

    /// Resolves an `Authorization` header value. Anything other than a valid,
    /// unexpired `Bearer` token is `Unauthorized`.
    pub fn resolve(&self, authorization: Option<&str>) -> Result<UserId, CollectionError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(CollectionError::Unauthorized)?;

        let key = DecodingKey::from_secret(&self.secret);
        let data = decode::<Claims>(token, &key, &self.validation).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            CollectionError::Unauthorized
        })?;

        UserId::new(data.claims.user_id).map_err(|_| CollectionError::Unauthorized)
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
