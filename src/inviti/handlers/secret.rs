use crate::inviti::{
    auth::{authorize, Keychain},
    secret as secret_generator,
    store::{
        tokens::{PendingToken, TokenStore},
        StoreError,
    },
};
use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SecretRequest {
    /// Grantee may create and close vacancies.
    #[serde(default)]
    pub can_manage_vacancies: bool,
    /// Grantee may emit further secrets.
    #[serde(default)]
    pub can_manage_permissions: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmittedSecret {
    pub secret: String,
}

type SecretResponse = Result<(StatusCode, HeaderMap, Json<EmittedSecret>), (StatusCode, String)>;

#[utoipa::path(
    post,
    path = "/authentication/secret",
    request_body = SecretRequest,
    responses (
        (status = 200, description = "One-time secret emitted", body = EmittedSecret),
        (status = 400, description = "Both permission flags are false", body = String),
        (status = 401, description = "Missing or invalid credential", body = String),
        (status = 403, description = "Caller may not manage permissions", body = String),
        (status = 500, description = "Error persisting the secret", body = String)
    ),
    security(("bearer" = [])),
    tag = "authentication",
)]
/// Emit a one-time secret granting the requested permissions.
///
/// The response is the only copy of the secret; delivering it to the grantee
/// is the caller's problem.
#[instrument(skip(pool, keychain, headers, payload))]
pub async fn secret(
    Extension(pool): Extension<PgPool>,
    Extension(keychain): Extension<Arc<Keychain>>,
    headers: HeaderMap,
    payload: Option<Json<SecretRequest>>,
) -> SecretResponse {
    let identity = authorize(&headers, &keychain)?;
    if !identity.can_manage_permissions {
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }

    let request = parse_payload(payload);
    let token = PendingToken {
        secret: secret_generator::generate(),
        can_manage_permissions: request.can_manage_permissions,
        can_manage_vacancies: request.can_manage_vacancies,
    };
    validate_grants(&token)?;

    store_token(&pool, &token).await?;

    info!(
        user_id = identity.user_id,
        can_manage_permissions = token.can_manage_permissions,
        can_manage_vacancies = token.can_manage_vacancies,
        "Emitted one-time secret"
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok((
        StatusCode::OK,
        response_headers,
        Json(EmittedSecret {
            secret: token.secret,
        }),
    ))
}

// Missing body means both flags default to false, which the grant check
// rejects with the descriptive message rather than a generic payload error.
fn parse_payload(payload: Option<Json<SecretRequest>>) -> SecretRequest {
    payload.map_or_else(SecretRequest::default, |Json(request)| request)
}

fn validate_grants(token: &PendingToken) -> Result<(), (StatusCode, String)> {
    if token.grants_nothing() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please pass one of the attributes.".to_string(),
        ));
    }

    Ok(())
}

async fn store_token(pool: &PgPool, token: &PendingToken) -> Result<(), (StatusCode, String)> {
    TokenStore::store(pool, token).await.map_err(|err| {
        match err {
            // A fresh UUIDv4 colliding with a stored one means something is
            // deeply wrong with the generator, not with the request.
            StoreError::Conflict => error!("Emitted secret collided with a stored one"),
            StoreError::Database(ref db_err) => error!("Failed to store secret: {db_err}"),
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    })
}
