use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("failed to parse PDF: {0}")]
    InvalidDocument(String),

    #[error("failed to serialize PDF: {0}")]
    WriteError(String),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("failed to decode snapshot: {0}")]
    DecodeError(String),

    #[error("unsupported snapshot encoding: {0}")]
    UnsupportedFormat(String),

    #[error("failed to compress image data: {0}")]
    CompressError(String),
}
