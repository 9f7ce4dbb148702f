use thiserror::Error;

use pizzabot_core::errors::StorageError;

pub mod memory;
pub mod order;

pub use memory::InMemoryOrderStore;
pub use order::SqlOrderStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("order `{0}` was not found")]
    NotFound(String),
}

impl From<RepositoryError> for StorageError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(order_id) => StorageError::NotFound(order_id),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}
