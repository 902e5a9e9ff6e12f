#[allow(unused_imports)]
use crate::{
    cli::globals::GlobalArgs,
    inviti::handlers::{
        health::__path_health, secret::__path_secret, token::__path_token,
        vacancies::__path_close_vacancy, vacancies::__path_get_vacancy,
        vacancies::__path_list_vacancies, vacancies::__path_open_vacancy,
    },
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod claims;
pub mod handlers;
pub mod secret;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(health, token, secret, list_vacancies, get_vacancy, open_vacancy, close_vacancy),
    components(
        schemas(
            handlers::health::Health,
            handlers::token::AuthenticationRequest,
            handlers::token::Credential,
            handlers::secret::SecretRequest,
            handlers::secret::EmittedSecret,
            handlers::vacancies::OpenVacancyRequest,
            handlers::vacancies::OpenedVacancy,
            store::vacancies::Vacancy,
            store::vacancies::VacancyHeader,
        )
    ),
    tags(
        (name = "authentication", description = "One-time secrets and bearer credentials"),
        (name = "vacancies", description = "Vacancy management API"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// router
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    seed_first_secret(&pool, globals).await?;

    let keychain = Arc::new(auth::Keychain::new(&globals.signing_key));

    let cors = CorsLayer::new()
        // allow `GET`, `POST` and `DELETE` when accessing the resource
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        // allow requests from any origin
        .allow_origin(Any);

    let app = Router::new()
        .route("/authentication/token", post(handlers::token))
        .route("/authentication/secret", post(handlers::secret))
        .route(
            "/vacancies",
            get(handlers::list_vacancies).post(handlers::open_vacancy),
        )
        .route(
            "/vacancies/:id",
            get(handlers::get_vacancy).delete(handlers::close_vacancy),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(pool.clone()))
                .layer(Extension(keychain)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Seed the bootstrap secret, granting both permissions, when one was
/// configured and no pending secrets exist yet. Without it a fresh
/// deployment has no way to mint its first credential.
async fn seed_first_secret(pool: &PgPool, globals: &GlobalArgs) -> Result<()> {
    let Some(first_secret) = &globals.first_secret else {
        return Ok(());
    };

    if !store::tokens::TokenStore::is_empty(pool)
        .await
        .context("Failed to check for pending secrets")?
    {
        return Ok(());
    }

    let token = store::tokens::PendingToken {
        secret: first_secret.expose_secret().to_string(),
        can_manage_permissions: true,
        can_manage_vacancies: true,
    };

    match store::tokens::TokenStore::store(pool, &token).await {
        Ok(()) => {
            info!("Seeded bootstrap secret");
            Ok(())
        }
        // Another replica seeded it between our emptiness check and the insert.
        Err(store::StoreError::Conflict) => Ok(()),
        Err(err) => Err(err).context("Failed to seed bootstrap secret"),
    }
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/health",
            "/authentication/token",
            "/authentication/secret",
            "/vacancies",
            "/vacancies/{id}",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
