use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub account_id: i64,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token format")]
    InvalidFormat,
    #[error("invalid token payload encoding")]
    InvalidEncoding,
    #[error("invalid token payload")]
    InvalidPayload,
}

/// Port consumed by the gateway: turn an opaque bearer token into identity.
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Decodes the claims segment of a dot-separated bearer token
/// (`header.payload.signature`, base64url without padding). Signature
/// verification belongs to the issuing auth service; this side only needs the
/// identity the token carries.
pub struct BearerDecoder;

impl TokenDecoder for BearerDecoder {
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidFormat);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| AuthError::InvalidEncoding)?;

        serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidPayload)
    }
}

/// Build an unsigned token carrying the given claims. Used by local tooling
/// and tests; production tokens come signed from the auth service.
pub fn encode_claims(claims: &Claims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let claims = Claims {
            account_id: 42,
            email: "mara@example.com".to_string(),
        };
        let token = encode_claims(&claims);
        let decoded = BearerDecoder.decode(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(matches!(
            BearerDecoder.decode("just-one-part"),
            Err(AuthError::InvalidFormat)
        ));
        assert!(matches!(
            BearerDecoder.decode("two.parts"),
            Err(AuthError::InvalidFormat)
        ));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            BearerDecoder.decode("aGVhZGVy.!!!not-base64!!!.c2ln"),
            Err(AuthError::InvalidEncoding)
        ));
    }

    #[test]
    fn rejects_non_claims_payload() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"nope"}"#);
        let token = format!("h.{payload}.s");
        assert!(matches!(
            BearerDecoder.decode(&token),
            Err(AuthError::InvalidPayload)
        ));
    }

    #[test]
    fn decodes_foreign_signed_tokens() {
        // A signature segment from another issuer is carried but ignored.
        let payload = URL_SAFE_NO_PAD.encode(br#"{"account_id":7,"email":"a@b.c"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.c2lnbmF0dXJl");
        let claims = BearerDecoder.decode(&token).unwrap();
        assert_eq!(claims.account_id, 7);
    }
}
