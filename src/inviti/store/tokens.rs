use crate::inviti::store::StoreError;
use sqlx::PgPool;
use tracing::{info_span, Instrument};

/// A one-time secret waiting to be exchanged for a credential, together with
/// the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingToken {
    pub secret: String,
    pub can_manage_permissions: bool,
    pub can_manage_vacancies: bool,
}

impl PendingToken {
    /// A token that grants neither permission is useless: exchanging it
    /// yields a credential that cannot do anything.
    #[must_use]
    pub fn grants_nothing(&self) -> bool {
        !self.can_manage_permissions && !self.can_manage_vacancies
    }
}

pub struct TokenStore;

impl TokenStore {
    /// Persist a pending secret.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the secret already exists, or
    /// [`StoreError::Database`] on any other database failure.
    pub async fn store(pool: &PgPool, token: &PendingToken) -> Result<(), StoreError> {
        let query = "INSERT INTO authentication_tokens \
                     (secret, can_manage_permissions, can_manage_vacancies) \
                     VALUES ($1, $2, $3)";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        sqlx::query(query)
            .bind(&token.secret)
            .bind(token.can_manage_permissions)
            .bind(token.can_manage_vacancies)
            .execute(pool)
            .instrument(span)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
                other => StoreError::Database(other),
            })?;

        Ok(())
    }

    /// Atomically consume a pending secret: delete the row and return it in
    /// one statement, so that under concurrent exchanges at most one caller
    /// ever sees the token.
    ///
    /// Returns `None` when the secret is unknown or was already consumed.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn consume(pool: &PgPool, secret: &str) -> Result<Option<PendingToken>, sqlx::Error> {
        let query = "DELETE FROM authentication_tokens WHERE secret = $1 \
                     RETURNING secret, can_manage_permissions, can_manage_vacancies";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        sqlx::query_as::<_, PendingToken>(query)
            .bind(secret)
            .fetch_optional(pool)
            .instrument(span)
            .await
    }

    /// Whether no pending secrets exist. Used once at startup to decide if
    /// the bootstrap secret should be seeded.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn is_empty(pool: &PgPool) -> Result<bool, sqlx::Error> {
        let query = "SELECT NOT EXISTS(SELECT 1 FROM authentication_tokens) AS empty";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        sqlx::query_scalar::<_, bool>(query)
            .fetch_one(pool)
            .instrument(span)
            .await
    }
}
