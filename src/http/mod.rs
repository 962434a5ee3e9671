//! HTTP transport: a serial, abortable request queue with bearer-credential
//! support.
//!
//! Grounded on `upload_artifact_chunks`'s async-trait ports (the
//! store/retrieve/assemble shape of `ChunkStorage`) for the overall
//! async, `Result`-returning style, with the exact FIFO-queue + abort-all +
//! per-verb-enqueue contract carried over from the tus client this module
//! implements.

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, Transport};
pub use request::{Method, Request};
pub use response::Response;
