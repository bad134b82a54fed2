use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// The two classes of bearer token. Each carries its own issuer label and
/// lifetime; verification is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const fn issuer(self) -> &'static str {
        match self {
            TokenKind::Access => "chirpy-access",
            TokenKind::Refresh => "chirpy-refresh",
        }
    }

    pub fn lifetime(self) -> Duration {
        match self {
            TokenKind::Access => Duration::hours(1),
            TokenKind::Refresh => Duration::days(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Makes every issued token a distinct string, so revoking one refresh
    /// token never revokes another issued in the same second.
    pub jti: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization header missing")]
    Missing,

    #[error("authorization header malformed")]
    Malformed,

    /// Signature, issuer, expiry or subject check failed. Which one is not
    /// reported.
    #[error("invalid token")]
    Invalid,

    #[error("token signing failed: {0}")]
    Signing(String),
}

pub fn issue_token(kind: TokenKind, secret: &str, user_id: u64) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        iss: kind.issuer().to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + kind.lifetime()).timestamp(),
        jti: Uuid::new_v4(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify `token` as a token of `kind` and return the user id it was issued
/// for.
pub fn extract_user_id(kind: TokenKind, secret: &str, token: &str) -> Result<u64, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[kind.issuer()]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Rejected {:?} token: {}", kind, e);
        TokenError::Invalid
    })?;

    data.claims.sub.parse().map_err(|_| {
        debug!("Rejected {:?} token: non-numeric subject", kind);
        TokenError::Invalid
    })
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    extract_authorization(headers, "Bearer")
}

/// Pull the key out of an `Authorization: ApiKey <key>` header.
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, TokenError> {
    extract_authorization(headers, "ApiKey")
}

fn extract_authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Malformed)?;

    let credential = value
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or(TokenError::Malformed)?;

    if credential.is_empty() || credential.contains(char::is_whitespace) {
        return Err(TokenError::Malformed);
    }
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(kind: TokenKind, sub: &str, exp_offset: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            iss: kind.issuer().to_string(),
            sub: sub.to_string(),
            iat: now.timestamp(),
            exp: (now + exp_offset).timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn access_token_roundtrip() {
        let token = issue_token(TokenKind::Access, SECRET, 42).unwrap();
        assert_eq!(extract_user_id(TokenKind::Access, SECRET, &token), Ok(42));
    }

    #[test]
    fn refresh_token_roundtrip() {
        let token = issue_token(TokenKind::Refresh, SECRET, 9).unwrap();
        assert_eq!(extract_user_id(TokenKind::Refresh, SECRET, &token), Ok(9));
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let access = issue_token(TokenKind::Access, SECRET, 42).unwrap();
        let refresh = issue_token(TokenKind::Refresh, SECRET, 42).unwrap();

        assert_eq!(
            extract_user_id(TokenKind::Refresh, SECRET, &access),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            extract_user_id(TokenKind::Access, SECRET, &refresh),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn issued_claims_match_kind() {
        let token = issue_token(TokenKind::Refresh, SECRET, 3).unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["chirpy-refresh"]);
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.sub, "3");
        assert_eq!(claims.exp - claims.iat, 60 * 24 * 60 * 60);
    }

    #[test]
    fn tokens_issued_together_differ() {
        let a = issue_token(TokenKind::Refresh, SECRET, 1).unwrap();
        let b = issue_token(TokenKind::Refresh, SECRET, 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = issue_token(TokenKind::Access, SECRET, 42).unwrap();
        assert_eq!(
            extract_user_id(TokenKind::Access, "other-secret", &token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_token_is_invalid() {
        let claims = claims_for(TokenKind::Access, "42", Duration::seconds(-5));
        let token = sign(&claims, SECRET);
        assert_eq!(
            extract_user_id(TokenKind::Access, SECRET, &token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let claims = claims_for(TokenKind::Access, "not-a-number", Duration::hours(1));
        let token = sign(&claims, SECRET);
        assert_eq!(
            extract_user_id(TokenKind::Access, SECRET, &token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(
            extract_user_id(TokenKind::Access, SECRET, "not.a.jwt"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn missing_header_is_distinct_from_malformed() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), Err(TokenError::Missing));

        for value in [
            "abc.def.ghi",
            "Bearer",
            "Bearer ",
            "Bearer a b",
            "Bearer   \t tok",
            "Bearer tok ",
            "bearer tok",
            "BearerTok",
            "Basic abc",
            "ApiKey abc",
        ] {
            assert_eq!(
                extract_bearer_token(&headers_with(value)),
                Err(TokenError::Malformed),
                "{value}"
            );
        }
    }

    #[test]
    fn api_key_extracted() {
        let headers = headers_with("ApiKey f271c81ff7084ee5b99a5091b42d486e");
        assert_eq!(extract_api_key(&headers), Ok("f271c81ff7084ee5b99a5091b42d486e"));
        assert_eq!(
            extract_api_key(&headers_with("Bearer f271")),
            Err(TokenError::Malformed)
        );
    }
}
