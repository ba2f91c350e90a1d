use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("recipe not found: {0}")]
    RecipeNotFound(Uuid),

    #[error("recipe already exists: {0}")]
    RecipeExists(Uuid),

    #[error("anchor queue is closed")]
    QueueClosed,

    #[error("anchor queue is full")]
    QueueFull,

    #[error("repository error: {0}")]
    Repository(String),
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
