use markup_core::ComposeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("document error: {0}")]
    Document(#[from] ComposeError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("failed to serialize session state: {0}")]
    Serialization(#[from] serde_json::Error),
}
