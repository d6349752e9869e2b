//! Signed bearer sessions.
//!
//! A session is a compact HS256 token (`header.claims.signature`, each part
//! base64url without padding). Nothing is stored server-side; a token is
//! valid until it expires.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};
use crate::models::{AccountId, Role};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// What a session token asserts about its bearer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AccountId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct SessionIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    /// Issues a token for `account_id` valid for the configured lifetime.
    pub fn issue(&self, account_id: AccountId, role: Role) -> ApiResult<String> {
        self.issue_at(account_id, role, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, account_id: AccountId, role: Role, now: OffsetDateTime) -> ApiResult<String> {
        let iat = now.unix_timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| anyhow::anyhow!("Session lifetime {:?} is out of range", self.ttl))?;
        let claims = Claims {
            sub: account_id,
            role,
            iat,
            exp,
        };
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).map_err(anyhow::Error::from)?);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(anyhow::Error::from)?);
        let message = format!("{header}.{claims}");

        let signature = URL_SAFE_NO_PAD.encode(self.mac(&message)?.finalize().into_bytes());
        Ok(format!("{message}.{signature}"))
    }

    /// Checks a token's signature and expiry and returns its claims.
    ///
    /// # Errors
    ///
    /// * [`ApiError::InvalidSession`] for anything malformed, signed with
    ///   another key or using another algorithm.
    /// * [`ApiError::ExpiredSession`] for a correctly signed token whose
    ///   expiry has passed.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    fn verify_at(&self, token: &str, now: OffsetDateTime) -> ApiResult<Claims> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ApiError::InvalidSession);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ApiError::InvalidSession)?;
        self.mac(&format!("{header}.{claims}"))?
            .verify_slice(&signature)
            .map_err(|_| ApiError::InvalidSession)?;

        let header: Header = decode_part(header)?;
        if header.alg != "HS256" {
            return Err(ApiError::InvalidSession);
        }
        let claims: Claims = decode_part(claims)?;

        if claims.exp <= now.unix_timestamp() {
            return Err(ApiError::ExpiredSession);
        }
        Ok(claims)
    }

    fn mac(&self, message: &str) -> ApiResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("Failed to create HMAC: {e}"))?;
        mac.update(message.as_bytes());
        Ok(mac)
    }
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> ApiResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| ApiError::InvalidSession)?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::InvalidSession)
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> ApiResult<&str> {
    let header = header.ok_or(ApiError::Unauthenticated)?;
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::Unauthenticated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new("test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn issued_tokens_verify() {
        let token = issuer().issue(42, Role::Nurse).unwrap();
        let claims = issuer().verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Nurse);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn other_keys_are_rejected() {
        let token = issuer().issue(1, Role::Admin).unwrap();
        let other = SessionIssuer::new("another-secret", Duration::from_secs(3600));
        assert!(matches!(other.verify(&token), Err(ApiError::InvalidSession)));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = issuer().issue(1, Role::Patient).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            br#"{"sub":1,"role":"admin","iat":0,"exp":99999999999}"#,
        );
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(matches!(
            issuer().verify(&tampered),
            Err(ApiError::InvalidSession)
        ));
        assert!(matches!(
            issuer().verify("not-a-token"),
            Err(ApiError::InvalidSession)
        ));
    }

    #[test]
    fn expired_tokens_are_distinguished() {
        let issued = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let token = issuer().issue_at(1, Role::Patient, issued).unwrap();
        assert!(matches!(
            issuer().verify(&token),
            Err(ApiError::ExpiredSession)
        ));
    }

    #[test]
    fn oversized_lifetime_fails_instead_of_wrapping() {
        for secs in [u64::MAX, i64::MAX as u64] {
            let issuer = SessionIssuer::new("test-secret", Duration::from_secs(secs));
            assert!(matches!(
                issuer.issue(1, Role::Patient),
                Err(ApiError::Internal(_))
            ));
        }
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert!(matches!(bearer_token(None), Err(ApiError::Unauthenticated)));
        assert!(matches!(
            bearer_token(Some("Basic dXNlcjpwYXNz")),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            bearer_token(Some("Bearer ")),
            Err(ApiError::Unauthenticated)
        ));
    }
}
