//! Pure size arithmetic and chunk-size policy.
//!
//! KB is 1000, not 1024.

pub const KB: u64 = 1_000;
pub const MB: u64 = 1_000 * KB;
pub const GB: u64 = 1_000 * MB;

/// Picks a chunk size for a file of `file_size` bytes when the caller did
/// not override one. Whole-file-in-one-chunk below 10MB; otherwise fixed
/// tiers growing with file size.
pub fn default_chunk_size(file_size: u64) -> u64 {
    if file_size >= GB {
        10 * MB
    } else if file_size >= 100 * MB {
        5 * MB
    } else if file_size >= 50 * MB {
        2 * MB
    } else if file_size >= 10 * MB {
        MB
    } else {
        file_size.max(1)
    }
}

/// Number of chunks needed to cover `file_size` bytes at `chunk_size` bytes
/// per chunk: `ceil(file_size / chunk_size)`.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u32 {
    if file_size == 0 {
        return 1;
    }
    file_size.div_ceil(chunk_size) as u32
}
