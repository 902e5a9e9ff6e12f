//! Postgres persistence: pending one-time secrets and vacancies.

pub mod tokens;
pub mod vacancies;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same key already exists.
    #[error("already exists")]
    Conflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
