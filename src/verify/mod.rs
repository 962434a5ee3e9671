//! Pluggable content verification.
//!
//! Grounded on the checksum verification in
//! `upload_artifact::handlers::upload_artifact_handler` (hash the body with
//! a `Digest` impl, hex-encode, compare case-insensitively against a
//! provided digest) — generalized into a trait so the algorithm is
//! pluggable, with a default MD5 implementation shipped out of the box.

mod md5;

pub use md5::Md5Verifier;

use crate::error::VerifyError;

/// A pluggable content hash/verify strategy.
pub trait FileVerifier: Send + Sync {
    /// Lowercase hex digest of `bytes`.
    fn hash(&self, bytes: &[u8]) -> String;

    /// Whether `hash(bytes)` equals `expected`, compared case-insensitively.
    fn verify(&self, bytes: &[u8], expected: &str) -> Result<(), VerifyError> {
        let computed = self.hash(bytes);
        if computed.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: expected.to_string(),
                computed,
            })
        }
    }
}
