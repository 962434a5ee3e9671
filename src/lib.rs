//! Client-side implementation of the tus 1.0.0 resumable upload protocol.
//!
//! The entry point is [`session::UploadSession`], which drives one file's
//! upload lifecycle (create, chunk, pause, resume, cancel, retry) against a
//! tus server. [`cache::CacheRepository`] persists enough state on local
//! storage to resume an upload after a process restart; [`chunk::Chunker`]
//! stages chunks on disk so transmission is decoupled from reading the
//! source file over and over.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod record;
pub mod session;
pub mod verify;

pub use error::{TusError, TusResult};
pub use session::{ServerInformation, Status, UploadSession, UploadSessionBuilder};
