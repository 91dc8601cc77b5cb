use super::Claims;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use sha2::Digest;
use sha2::Sha256;
use std::time::Duration;

/// JWT signing/verification and session-token hashing.
///
/// Holds the HMAC secret loaded once at startup and shared across
/// connection handlers via `web::Data<Crypto>`.
#[derive(Clone)]
pub struct Crypto {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Loads the signing secret from the `JWT_SECRET` environment variable.
    ///
    /// # Panics
    /// Panics if `JWT_SECRET` is not set — this only runs once at startup.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Self::new(secret.as_bytes())
    }

    /// Validity window for issued tokens.
    pub fn duration() -> Duration {
        Duration::from_secs(60 * 60 * 24 * 7)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }

    /// One-way digest used to store a session token's fingerprint instead of
    /// the raw token, matching how `Session` rows never hold a decodable value.
    pub fn hash(value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::ID;

    #[test]
    fn encode_then_decode_round_trips_claims() {
        let crypto = Crypto::new(b"test-secret");
        let claims = Claims::new(ID::default(), ID::default(), "alice".into());
        let token = crypto.encode(&claims).unwrap();
        let back = crypto.decode(&token).unwrap();
        assert_eq!(back.usr, "alice");
        assert_eq!(back.sub, claims.sub);
    }

    #[test]
    fn decode_rejects_tokens_signed_with_a_different_secret() {
        let a = Crypto::new(b"secret-a");
        let b = Crypto::new(b"secret-b");
        let claims = Claims::new(ID::default(), ID::default(), "alice".into());
        let token = a.encode(&claims).unwrap();
        assert!(b.decode(&token).is_err());
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(Crypto::hash("same-input"), Crypto::hash("same-input"));
        assert_ne!(Crypto::hash("a"), Crypto::hash("b"));
    }
}
