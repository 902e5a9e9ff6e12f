use crate::inviti::{
    auth::{self, Keychain},
    claims::Claims,
    store::tokens::TokenStore,
};
use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct AuthenticationRequest {
    /// Unique integer identifying the user being authenticated.
    pub user_id: u64,
    /// One-time secret previously emitted by a privileged user.
    pub secret: String,
}

/// Response payload: the signed credential plus the echoed user id and the
/// permissions it carries.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Credential {
    pub access_token: String,
    pub user_id: u64,
    pub can_manage_permissions: bool,
    pub can_manage_vacancies: bool,
}

type TokenResponse = Result<(StatusCode, HeaderMap, Json<Credential>), (StatusCode, String)>;

#[utoipa::path(
    post,
    path = "/authentication/token",
    request_body = AuthenticationRequest,
    responses (
        (status = 200, description = "Secret consumed, credential issued", body = Credential),
        (status = 400, description = "Missing or malformed payload", body = String),
        (status = 403, description = "Unknown or already consumed secret", body = String),
        (status = 500, description = "Error issuing the credential", body = String)
    ),
    tag = "authentication",
)]
/// Exchange a one-time secret for a bearer credential.
///
/// The secret is consumed atomically: a second exchange with the same secret
/// is indistinguishable from a secret that never existed.
#[instrument(skip(pool, keychain, payload))]
pub async fn token(
    Extension(pool): Extension<PgPool>,
    Extension(keychain): Extension<Arc<Keychain>>,
    payload: Option<Json<AuthenticationRequest>>,
) -> TokenResponse {
    let request = parse_payload(payload)?;

    let pending = TokenStore::consume(&pool, &request.secret)
        .await
        .map_err(|err| {
            error!("Failed to consume secret: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        })?;

    // Not found and already consumed collapse into the same rejection so a
    // caller cannot probe which secrets were ever emitted.
    let Some(pending) = pending else {
        warn!("Authentication attempt with a secret that was never emitted");
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    };

    let claims = Claims::new(request.user_id, &pending);
    let access_token = auth::issue(&keychain, &claims).map_err(|err| {
        error!("Failed to sign credential: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    })?;

    let credential = Credential {
        access_token,
        user_id: request.user_id,
        can_manage_permissions: pending.can_manage_permissions,
        can_manage_vacancies: pending.can_manage_vacancies,
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok((StatusCode::OK, response_headers, Json(credential)))
}

fn parse_payload(
    payload: Option<Json<AuthenticationRequest>>,
) -> Result<AuthenticationRequest, (StatusCode, String)> {
    let Some(Json(request)) = payload else {
        return Err((StatusCode::BAD_REQUEST, "Missing payload".to_string()));
    };

    if request.secret.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing secret".to_string()));
    }

    Ok(request)
}
