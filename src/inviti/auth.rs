use crate::inviti::claims::{Claims, AUDIENCE, ISSUER};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Holds the symmetric key material used to sign and verify bearer
/// credentials. Built once at startup from configuration and injected where
/// needed; immutable afterwards.
pub struct Keychain {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keychain {
    #[must_use]
    pub fn new(signing_key: &SecretString) -> Self {
        let secret = signing_key.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl std::fmt::Debug for Keychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keychain").finish_non_exhaustive()
    }
}

/// Sign a claim set into a bearer credential (HMAC-SHA-512 JWT).
///
/// The credential carries no expiration: once issued it stays valid for as
/// long as the signing key does.
///
/// # Errors
/// Returns an error if serialization or signing fails.
pub fn issue(keychain: &Keychain, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::new(Algorithm::HS512), claims, &keychain.encoding)
}

/// Verify a presented credential and recover its claims.
///
/// Accepts only HS512 signatures made with our key, and pins issuer and
/// audience to this service. Lifetime is deliberately not validated:
/// credentials never expire (see the crate docs).
///
/// # Errors
/// Returns an error if the token is malformed, the signature does not
/// verify, or issuer/audience do not match exactly.
pub fn verify(keychain: &Keychain, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS512);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.set_required_spec_claims(&["iss", "aud", "sub"]);
    validation.validate_exp = false;

    decode::<Claims>(token, &keychain.decoding, &validation).map(|data| data.claims)
}

/// An authenticated caller, as recovered from a verified credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub can_manage_permissions: bool,
    pub can_manage_vacancies: bool,
}

/// Authenticate a request from its `Authorization: Bearer` header.
///
/// Every failure collapses into the same `401` rejection so that a caller
/// cannot probe which part of the credential was wrong.
///
/// # Errors
/// Returns `401 Unauthorized` when the header is missing or malformed, the
/// credential fails verification, or the claims do not decode.
pub fn authorize(headers: &HeaderMap, keychain: &Keychain) -> Result<Identity, (StatusCode, String)> {
    let unauthorized = || (StatusCode::UNAUTHORIZED, "Unauthorized".to_string());

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let claims = verify(keychain, bearer).map_err(|err| {
        debug!("Credential verification failed: {err}");
        unauthorized()
    })?;

    let identity = Identity {
        user_id: claims.user_id().ok_or_else(unauthorized)?,
        can_manage_permissions: claims.manage_permissions().ok_or_else(unauthorized)?,
        can_manage_vacancies: claims.manage_vacancies().ok_or_else(unauthorized)?,
    };

    Ok(identity)
}
