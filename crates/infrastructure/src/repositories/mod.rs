//! PostgreSQL 存储实现

mod message_repository_impl;
mod user_repository_impl;

pub use message_repository_impl::PgMessageRepository;
pub use user_repository_impl::PgUserRepository;

use domain::RepositoryError;

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict
        }
        other => RepositoryError::storage(other.to_string()),
    }
}

pub(crate) fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}
