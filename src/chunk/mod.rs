//! Chunking: partitioning a source file into staged, indexed byte ranges.

mod chunker;
pub mod utility;

pub use chunker::{Chunk, Chunker};
