//! lookaside::checksum
//!
//! Digest-length driven checksum verification.
//!
//! The metadata control file never names its hash algorithm; the length
//! of the hex digest does:
//!
//! | Hex length | Algorithm |
//! |-----------:|-----------|
//! | 32         | MD5       |
//! | 40         | SHA-1     |
//! | 64         | SHA-256   |
//! | 128        | SHA-512   |

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Hash algorithms a lookaside digest may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Select the algorithm implied by a hex digest's length.
    pub fn from_digest(digest: &str) -> Option<Self> {
        match digest.len() {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Lowercase algorithm name, as used in origin URL templates.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest.
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Lowercase hex digest of `bytes`.
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(bytes)),
            Self::Sha1 => hex::encode(Sha1::digest(bytes)),
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
            Self::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Check `bytes` against an expected hex digest.
///
/// Returns the matching algorithm, or `None` when the digest length is not
/// one of the known sizes or the recomputed digest differs. Hex case is
/// ignored.
///
/// # Example
///
/// ```
/// use distmirror::lookaside::checksum::{verify, HashAlgorithm};
///
/// let md5_of_empty = "D41D8CD98F00B204E9800998ECF8427E";
/// assert_eq!(verify(b"", md5_of_empty), Some(HashAlgorithm::Md5));
/// assert_eq!(verify(b"x", md5_of_empty), None);
/// assert_eq!(verify(b"", "abc"), None);
/// ```
pub fn verify(bytes: &[u8], expected: &str) -> Option<HashAlgorithm> {
    let algorithm = HashAlgorithm::from_digest(expected)?;
    algorithm
        .hex_digest(bytes)
        .eq_ignore_ascii_case(expected)
        .then_some(algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &[u8] = b"hello\n";

    #[test]
    fn known_digests() {
        assert_eq!(
            HashAlgorithm::Md5.hex_digest(HELLO),
            "b1946ac92492d2347c6235b4d2611184"
        );
        assert_eq!(
            HashAlgorithm::Sha1.hex_digest(HELLO),
            "f572d396fae9206628714fb2ce00f72e94f2258f"
        );
        assert_eq!(
            HashAlgorithm::Sha256.hex_digest(HELLO),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn every_algorithm_verifies_its_own_digest() {
        for algorithm in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha512,
        ] {
            let digest = algorithm.hex_digest(HELLO);
            assert_eq!(digest.len(), algorithm.hex_len());
            assert_eq!(verify(HELLO, &digest), Some(algorithm));
            assert_eq!(verify(HELLO, &digest.to_uppercase()), Some(algorithm));
            assert_eq!(verify(b"other", &digest), None);
        }
    }

    #[test]
    fn unknown_lengths_are_rejected() {
        let sha256 = HashAlgorithm::Sha256.hex_digest(HELLO);
        assert_eq!(verify(HELLO, &sha256[..63]), None);
        assert_eq!(verify(HELLO, ""), None);
        assert_eq!(HashAlgorithm::from_digest(&"a".repeat(96)), None);
    }
}
