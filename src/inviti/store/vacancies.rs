use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info_span, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// A published vacancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct Vacancy {
    pub id: Uuid,
    /// Chat user id of the member who opened the vacancy, kept as its
    /// decimal string form.
    pub owner_user_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Listing view of a vacancy: just enough to render an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct VacancyHeader {
    pub id: Uuid,
    pub title: String,
}

pub struct VacancyStore;

impl VacancyStore {
    /// Insert a new vacancy and return its generated id.
    ///
    /// # Errors
    /// Returns an error if the database insert fails.
    pub async fn add(
        pool: &PgPool,
        owner_user_id: u64,
        title: &str,
        description: &str,
    ) -> Result<Uuid, sqlx::Error> {
        let query = "INSERT INTO vacancies (id, owner_user_id, title, description) \
                     VALUES ($1, $2, $3, $4)";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        let id = Uuid::new_v4();
        sqlx::query(query)
            .bind(id)
            .bind(owner_user_id.to_string())
            .bind(title)
            .bind(description)
            .execute(pool)
            .instrument(span)
            .await?;

        Ok(id)
    }

    /// List all vacancies, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_headers(pool: &PgPool) -> Result<Vec<VacancyHeader>, sqlx::Error> {
        let query = "SELECT id, title FROM vacancies ORDER BY created_at DESC";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        sqlx::query_as::<_, VacancyHeader>(query)
            .fetch_all(pool)
            .instrument(span)
            .await
    }

    /// Fetch a single vacancy, `None` when the id is unknown.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Vacancy>, sqlx::Error> {
        let query = "SELECT id, owner_user_id, title, description, created_at \
                     FROM vacancies WHERE id = $1";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        sqlx::query_as::<_, Vacancy>(query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span)
            .await
    }

    /// Delete a vacancy. Returns `false` when there was nothing to delete.
    ///
    /// # Errors
    /// Returns an error if the database delete fails.
    pub async fn remove(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let query = "DELETE FROM vacancies WHERE id = $1";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        let result = sqlx::query(query)
            .bind(id)
            .execute(pool)
            .instrument(span)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
