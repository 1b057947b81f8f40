use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Destination list has {count} entries, tier allows {limit}")]
    DestinationLimit { count: usize, limit: i64 },

    #[error("Operation not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Engine failure: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
