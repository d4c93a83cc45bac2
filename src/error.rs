#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Database error")]
    Database(#[from] sqlx::error::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
