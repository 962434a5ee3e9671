use super::FileVerifier;
use md5::{Digest, Md5};

/// Default [`FileVerifier`] implementation, matching the source's shipped
/// `Md5Verifier`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Verifier;

impl FileVerifier for Md5Verifier {
    fn hash(&self, bytes: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_known_vector() {
        let verifier = Md5Verifier;
        // md5("") == d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(verifier.hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn verify_accepts_case_insensitive_match() {
        let verifier = Md5Verifier;
        let digest = verifier.hash(b"hello world");
        assert!(verifier.verify(b"hello world", &digest.to_uppercase()).is_ok());
    }

    #[test]
    fn verify_rejects_mismatch() {
        let verifier = Md5Verifier;
        assert!(verifier.verify(b"hello world", "deadbeef").is_err());
    }
}
