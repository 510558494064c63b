use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Issuer stamped into every session token.
pub const ISSUER: &str = "flow";

/// Validated identity payload carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("anonymous subject cannot be issued a token")]
    InvalidSubject,

    #[error("token signing secret is empty")]
    EmptySecret,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token was signed with an unexpected algorithm")]
    WrongAlgorithm,

    #[error("token signature does not verify")]
    BadSignature,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => TokenError::WrongAlgorithm,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Algorithms a session token may be signed with.
const HMAC_FAMILY: [&str; 3] = ["HS256", "HS384", "HS512"];

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

/// Reject a foreign `alg` before jsonwebtoken sees the header, since values it
/// cannot represent (`none`, typos) would otherwise surface as parse errors.
/// Headers that do not decode are left for `decode` to report as malformed.
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let segment = token.split('.').next().unwrap_or_default();
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment) else {
        return Ok(());
    };
    let Ok(header) = serde_json::from_slice::<RawHeader>(&bytes) else {
        return Ok(());
    };

    match header.alg.as_deref() {
        Some(alg) if !HMAC_FAMILY.contains(&alg) => Err(TokenError::WrongAlgorithm),
        _ => Ok(()),
    }
}

/// Issues and validates HMAC-signed session tokens.
///
/// The secret is fixed at construction, so one authority can be shared across
/// any number of concurrent validations.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Any member of the HMAC family is accepted; anything else is an
        // algorithm substitution.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a fresh token for `user_id`. The zero id is reserved for anonymous callers.
    pub fn issue(&self, email: &str, user_id: i64) -> Result<String, TokenError> {
        if user_id == 0 {
            return Err(TokenError::InvalidSubject);
        }

        let now = Utc::now();
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        check_algorithm(token)?;
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn authority() -> TokenAuthority {
        TokenAuthority::new(SECRET, Duration::hours(1)).unwrap()
    }

    #[test]
    fn test_issue_then_validate() {
        let authority = authority();
        for id in [1_i64, 42, 123_456_789] {
            let token = authority.issue("test@example.com", id).unwrap();
            let claims = authority.validate(&token).unwrap();
            assert_eq!(claims.user_id, id);
            assert_eq!(claims.email, "test@example.com");
            assert_eq!(claims.iss, ISSUER);
            assert!(claims.iat < claims.exp);
        }
    }

    #[test]
    fn test_token_ids_are_unique() {
        let authority = authority();
        let a = authority.validate(&authority.issue("a@example.com", 7).unwrap()).unwrap();
        let b = authority.validate(&authority.issue("a@example.com", 7).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_zero_subject_rejected() {
        assert_eq!(authority().issue("test@example.com", 0), Err(TokenError::InvalidSubject));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenAuthority::new(b"", Duration::minutes(15)),
            Err(TokenError::EmptySecret)
        ));
    }

    #[test]
    fn test_already_expired_token() {
        let authority = TokenAuthority::new(SECRET, Duration::seconds(-10)).unwrap();
        let token = authority.issue("test@example.com", 5).unwrap();
        assert_eq!(authority.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let authority = TokenAuthority::new(SECRET, Duration::seconds(1)).unwrap();
        let token = authority.issue("test@example.com", 5).unwrap();
        assert!(authority.validate(&token).is_ok());

        std::thread::sleep(std::time::Duration::from_millis(2100));
        assert_eq!(authority.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_foreign_algorithm_rejected() {
        // {"alg":"RS256","typ":"JWT"} over an otherwise plausible payload
        let token = concat!(
            "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.",
            "eyJ1c2VyX2lkIjo3LCJlbWFpbCI6ImFAYi5jIiwiaXNzIjoiZmxvdyIsImp0aSI6IngiLCJpYXQiOjE3MDAwMDAwMDAsImV4cCI6NDEwMjQ0NDgwMH0.",
            "c2lnbmF0dXJl"
        );
        assert_eq!(authority().validate(token), Err(TokenError::WrongAlgorithm));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        // {"alg":"none","typ":"JWT"} with an empty signature
        let token = concat!(
            "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.",
            "eyJ1c2VyX2lkIjo3LCJlbWFpbCI6ImFAYi5jIiwiaXNzIjoiZmxvdyIsImp0aSI6IngiLCJpYXQiOjE3MDAwMDAwMDAsImV4cCI6NDEwMjQ0NDgwMH0.",
        );
        assert_eq!(authority().validate(token), Err(TokenError::WrongAlgorithm));
    }

    #[test]
    fn test_other_hmac_variant_accepted() {
        let now = Utc::now();
        let claims = Claims {
            user_id: 9,
            email: "hs512@example.com".to_string(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(authority().validate(&token).unwrap(), claims);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = TokenAuthority::new(b"another-secret", Duration::hours(1)).unwrap();
        let token = other.issue("test@example.com", 3).unwrap();
        assert_eq!(authority().validate(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert_eq!(authority().validate("invalid-token"), Err(TokenError::Malformed));
        assert_eq!(authority().validate(""), Err(TokenError::Malformed));
    }
}
