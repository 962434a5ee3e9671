//! Error taxonomy for the upload session engine.
//!
//! A leaf `thiserror` enum per module, composed into a top-level error via
//! `#[from]`/`From` impls, so a caller can match on the specific subsystem
//! that failed without every module depending on every other module's
//! error type.

use thiserror::Error;

pub type TusResult<T> = std::result::Result<T, TusError>;

#[derive(Debug, Error)]
pub enum TusError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("upload conflicted with server state {attempts} times, exceeding the retry cap")]
    ConflictRetriesExhausted { attempts: u32 },

    #[error("server rejected request with unexpected status {status}: {body}")]
    ProtocolError { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("source file does not exist: {0}")]
    SourceNotFound(String),

    #[error("failed to read source file: {0}")]
    Read(#[from] std::io::Error),

    #[error("chunk size must be positive and at most the file size (got {chunk_size} for a {file_size}-byte file)")]
    InvalidChunkSize { chunk_size: u64, file_size: u64 },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache document at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cache document at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cache document at {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request builder rejected a {method} body for a {expected} request")]
    MethodMismatch { method: String, expected: String },

    #[error("url is not permitted on the wire: {0}")]
    InvalidUrl(String),

    #[error("transport-level failure: {0}")]
    Io(#[from] reqwest::Error),

    #[error("location header missing from creation response")]
    MissingLocation,

    #[error("request was aborted before it could complete")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    Mismatch { expected: String, computed: String },
}
