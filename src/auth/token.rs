//! HS256 token codec for access and refresh tokens.
//!
//! Verification is pure: it asserts cryptographic and temporal validity
//! only. Whether a refresh token is still the live session is the identity
//! service's job; access tokens are deliberately never checked against the
//! store.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Fixed allowance for wall-clock skew between issuer and verifier.
pub const CLOCK_SKEW_SECONDS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed token from the given claims.
///
/// # Errors
///
/// Returns an error if the claims cannot be encoded or the key is rejected.
pub fn sign_hs256(secret: &[u8], claims: &TokenClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature does not match,
/// - the claims carry the wrong kind or are past `exp` (minus skew).
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    expected_kind: TokenKind,
    now_unix_seconds: i64,
) -> Result<TokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature_bytes)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: TokenClaims = b64d_json(claims_b64)?;
    if claims.kind != expected_kind {
        return Err(Error::WrongKind);
    }
    if claims.exp <= now_unix_seconds - CLOCK_SKEW_SECONDS {
        return Err(Error::Expired);
    }

    Ok(claims)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

/// Issues and verifies token pairs bound to a user id.
pub struct TokenSigner {
    secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// Mint a signed token of the given kind for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or signing fails.
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, Error> {
        self.issue_at(user_id, kind, now_unix_seconds())
    }

    fn issue_at(&self, user_id: Uuid, kind: TokenKind, now: i64) -> Result<String, Error> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        };
        let claims = TokenClaims {
            sub: user_id,
            kind,
            iat: now,
            exp: now + ttl,
        };
        sign_hs256(self.secret.expose_secret().as_bytes(), &claims)
    }

    /// Verify a token of the expected kind and return the bound user id.
    ///
    /// # Errors
    ///
    /// Returns an error on bad signature, malformed structure, wrong kind,
    /// or expiry.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Uuid, Error> {
        self.verify_at(token, expected_kind, now_unix_seconds())
    }

    fn verify_at(&self, token: &str, expected_kind: TokenKind, now: i64) -> Result<Uuid, Error> {
        let claims = verify_hs256(
            token,
            self.secret.expose_secret().as_bytes(),
            expected_kind,
            now,
        )?;
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> TokenSigner {
        TokenSigner::new(SecretString::from("test-secret"), 900, 604_800)
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let user_id = Uuid::new_v4();
        let signer = signer();
        let token = signer.issue_at(user_id, TokenKind::Access, NOW)?;
        let verified = signer.verify_at(&token, TokenKind::Access, NOW)?;
        assert_eq!(verified, user_id);
        Ok(())
    }

    #[test]
    fn rejects_wrong_kind() -> Result<(), Error> {
        let signer = signer();
        let token = signer.issue_at(Uuid::new_v4(), TokenKind::Access, NOW)?;
        let result = signer.verify_at(&token, TokenKind::Refresh, NOW);
        assert!(matches!(result, Err(Error::WrongKind)));
        Ok(())
    }

    #[test]
    fn rejects_expired_but_allows_skew() -> Result<(), Error> {
        let signer = signer();
        let token = signer.issue_at(Uuid::new_v4(), TokenKind::Access, NOW)?;

        // Just inside the skew window: still accepted.
        let result =
            signer.verify_at(&token, TokenKind::Access, NOW + 900 + CLOCK_SKEW_SECONDS - 1);
        assert!(result.is_ok());

        let result = signer.verify_at(&token, TokenKind::Access, NOW + 900 + CLOCK_SKEW_SECONDS);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn rejects_tampered_signature() -> Result<(), Error> {
        let signer = signer();
        let token = signer.issue_at(Uuid::new_v4(), TokenKind::Access, NOW)?;
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('A');
        let result = signer.verify_at(&tampered, TokenKind::Access, NOW);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn rejects_foreign_secret() -> Result<(), Error> {
        let token = signer().issue_at(Uuid::new_v4(), TokenKind::Refresh, NOW)?;
        let other = TokenSigner::new(SecretString::from("other-secret"), 900, 604_800);
        let result = other.verify_at(&token, TokenKind::Refresh, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        let signer = signer();
        for garbage in ["", "a", "a.b", "a.b.c.d", "not base64 at all.x.y"] {
            assert!(signer.verify_at(garbage, TokenKind::Access, NOW).is_err());
        }
    }

    #[test]
    fn rejects_unsupported_algorithm() -> Result<(), Error> {
        let header = Base64UrlUnpadded::encode_string(b"{\"alg\":\"none\",\"typ\":\"JWT\"}");
        let claims = b64e_json(&TokenClaims {
            sub: Uuid::new_v4(),
            kind: TokenKind::Access,
            iat: NOW,
            exp: NOW + 900,
        })?;
        let token = format!("{header}.{claims}.");
        let result = verify_hs256(&token, b"test-secret", TokenKind::Access, NOW);
        assert!(matches!(result, Err(Error::UnsupportedAlg(_))));
        Ok(())
    }
}
