use crate::inviti::{
    auth::{authorize, Identity, Keychain},
    store::vacancies::{Vacancy, VacancyHeader, VacancyStore},
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize, Debug)]
pub struct OpenVacancyRequest {
    pub title: String,
    pub description: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OpenedVacancy {
    pub id: Uuid,
}

#[utoipa::path(
    get,
    path = "/vacancies",
    responses (
        (status = 200, description = "All open vacancies", body = [VacancyHeader]),
        (status = 500, description = "Error listing vacancies", body = String)
    ),
    tag = "vacancies",
)]
/// List all open vacancies, title and id only.
#[instrument(skip(pool))]
pub async fn list_vacancies(
    Extension(pool): Extension<PgPool>,
) -> Result<Json<Vec<VacancyHeader>>, (StatusCode, String)> {
    let headers = VacancyStore::list_headers(&pool)
        .await
        .map_err(internal_error)?;

    Ok(Json(headers))
}

#[utoipa::path(
    get,
    path = "/vacancies/{id}",
    params(("id" = Uuid, Path, description = "Vacancy id")),
    responses (
        (status = 200, description = "Full vacancy description", body = Vacancy),
        (status = 404, description = "No vacancy with this id"),
        (status = 500, description = "Error fetching the vacancy", body = String)
    ),
    tag = "vacancies",
)]
/// Fetch the full description of one vacancy.
#[instrument(skip(pool))]
pub async fn get_vacancy(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vacancy>, (StatusCode, String)> {
    let vacancy = VacancyStore::get(&pool, id).await.map_err(internal_error)?;

    vacancy.map(Json).ok_or_else(|| {
        debug!("Vacancy not found: {id}");
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    })
}

#[utoipa::path(
    post,
    path = "/vacancies",
    request_body = OpenVacancyRequest,
    responses (
        (status = 201, description = "Vacancy opened", body = OpenedVacancy),
        (status = 400, description = "Missing or malformed payload", body = String),
        (status = 401, description = "Missing or invalid credential", body = String),
        (status = 403, description = "Caller may not manage vacancies", body = String),
        (status = 500, description = "Error opening the vacancy", body = String)
    ),
    security(("bearer" = [])),
    tag = "vacancies",
)]
/// Open a new vacancy owned by the authenticated caller.
#[instrument(skip(pool, keychain, headers, payload))]
pub async fn open_vacancy(
    Extension(pool): Extension<PgPool>,
    Extension(keychain): Extension<Arc<Keychain>>,
    headers: HeaderMap,
    payload: Option<Json<OpenVacancyRequest>>,
) -> Result<(StatusCode, Json<OpenedVacancy>), (StatusCode, String)> {
    let identity = require_vacancy_manager(&headers, &keychain)?;
    let request = parse_payload(payload)?;

    let id = VacancyStore::add(&pool, identity.user_id, &request.title, &request.description)
        .await
        .map_err(internal_error)?;

    debug!("Opened vacancy: {id}");

    Ok((StatusCode::CREATED, Json(OpenedVacancy { id })))
}

#[utoipa::path(
    delete,
    path = "/vacancies/{id}",
    params(("id" = Uuid, Path, description = "Vacancy id")),
    responses (
        (status = 200, description = "Vacancy closed"),
        (status = 401, description = "Missing or invalid credential", body = String),
        (status = 403, description = "Caller may not manage vacancies", body = String),
        (status = 404, description = "No vacancy with this id"),
        (status = 500, description = "Error closing the vacancy", body = String)
    ),
    security(("bearer" = [])),
    tag = "vacancies",
)]
/// Close (delete) a vacancy.
#[instrument(skip(pool, keychain, headers))]
pub async fn close_vacancy(
    Extension(pool): Extension<PgPool>,
    Extension(keychain): Extension<Arc<Keychain>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let _identity = require_vacancy_manager(&headers, &keychain)?;

    let removed = VacancyStore::remove(&pool, id)
        .await
        .map_err(internal_error)?;

    if removed {
        Ok(StatusCode::OK)
    } else {
        warn!("Tried to close a vacancy that does not exist: {id}");
        Err((StatusCode::NOT_FOUND, "Not Found".to_string()))
    }
}

fn require_vacancy_manager(
    headers: &HeaderMap,
    keychain: &Keychain,
) -> Result<Identity, (StatusCode, String)> {
    let identity = authorize(headers, keychain)?;
    if identity.can_manage_vacancies {
        Ok(identity)
    } else {
        Err((StatusCode::FORBIDDEN, "Forbidden".to_string()))
    }
}

fn parse_payload(
    payload: Option<Json<OpenVacancyRequest>>,
) -> Result<OpenVacancyRequest, (StatusCode, String)> {
    let Some(Json(request)) = payload else {
        return Err((StatusCode::BAD_REQUEST, "Missing payload".to_string()));
    };

    if request.title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing title".to_string()));
    }

    Ok(request)
}

fn internal_error(err: sqlx::Error) -> (StatusCode, String) {
    error!("Database failure: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}
