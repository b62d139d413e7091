/// JWT Token Generation and Validation
///
/// HS256 tokens signed with one of two independent keys: a short-lived
/// access key and a long-lived refresh key.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenSubject};
use crate::configuration::JwtSettings;

/// Why a token failed to sign or verify
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("token has expired")]
    Expired,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token claims rejected: {0}")]
    ClaimsRejected(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for SignError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => SignError::Expired,
            ErrorKind::InvalidSignature => SignError::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => SignError::ClaimsRejected(err.to_string()),
            _ => SignError::Malformed,
        }
    }
}

/// A secret paired with the lifetime of tokens it signs
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SigningKey {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

/// Sign a token for `subject` that expires `key.ttl_seconds()` from now.
pub fn issue_token(
    subject: &TokenSubject,
    key: &SigningKey,
    issuer: &str,
) -> Result<String, SignError> {
    let claims = Claims::new(subject, key.ttl_seconds, issuer);

    let token = encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
        .map_err(|e| SignError::Signing(e.to_string()))?;
    tracing::debug!(user_id = %subject.id, jti = %claims.jti, "Token signed");
    Ok(token)
}

/// Check signature, expiry and issuer, returning the claims.
///
/// The signature is checked before any claim, so a token from a foreign
/// secret is always `InvalidSignature` even if it is also expired.
pub fn verify_token(token: &str, key: &SigningKey, issuer: &str) -> Result<Claims, SignError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    decode::<Claims>(token, &key.decoding, &validation)
        .map(|data| data.claims)
        .map_err(SignError::from)
}

/// Access and refresh keys for one issuer
#[derive(Clone)]
pub struct TokenKeys {
    access: SigningKey,
    refresh: SigningKey,
    issuer: String,
}

impl TokenKeys {
    pub fn new(access: SigningKey, refresh: SigningKey, issuer: impl Into<String>) -> Self {
        Self {
            access,
            refresh,
            issuer: issuer.into(),
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(
            SigningKey::new(&settings.access_secret, settings.access_token_expiry),
            SigningKey::new(&settings.refresh_secret, settings.refresh_token_expiry),
            settings.issuer.clone(),
        )
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access.ttl_seconds
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh.ttl_seconds
    }

    pub fn sign_access(&self, subject: &TokenSubject) -> Result<String, SignError> {
        issue_token(subject, &self.access, &self.issuer)
    }

    pub fn sign_refresh(&self, subject: &TokenSubject) -> Result<String, SignError> {
        issue_token(subject, &self.refresh, &self.issuer)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, SignError> {
        verify_token(token, &self.access, &self.issuer)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, SignError> {
        verify_token(token, &self.refresh, &self.issuer)
    }
}
