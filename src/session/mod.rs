//! The upload session engine: the state machine that drives one file's tus
//! upload lifecycle.
//!
//! Grounded on `crates/artifact/src/features/upload_artifact_chunks/use_case.rs`'s
//! `ChunkedUploadUseCase` (initiate/upload_chunk/complete/abort orchestrating
//! typed ports with `tracing` spans and `thiserror` propagation), mirrored
//! onto the client-side direction of the protocol: instead of a server
//! accepting chunks, this drives a client sending them.

mod engine;
mod server_info;
mod status;

pub use engine::{UploadSession, UploadSessionBuilder};
pub use server_info::ServerInformation;
pub use status::Status;
