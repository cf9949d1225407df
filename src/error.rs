use thiserror::Error;
use ts3_query::QueryError;

pub type Result<T> = std::result::Result<T, DeckError>;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("ClientQuery error: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}
