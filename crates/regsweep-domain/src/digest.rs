use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Algorithm prefix used by the registry API for blob references.
pub const SHA256_PREFIX: &str = "sha256:";
const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("unsupported digest algorithm in '{0}' (only sha256 is stored on disk)")]
    UnsupportedAlgorithm(String),
    #[error("'{0}' is not a 64 character lowercase hex sha256 digest")]
    Malformed(String),
}

/// A sha256 blob digest, stored as bare lowercase hex.
///
/// The on-disk layout names directories after the bare hex value while the
/// API addresses blobs as `sha256:<hex>`; both forms parse into the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobDigest(String);

impl BlobDigest {
    /// Parse a bare hex digest, as found in a layer-link directory name.
    pub fn from_hex(raw: &str) -> Result<Self, DigestError> {
        let valid = raw.len() == SHA256_HEX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(DigestError::Malformed(raw.to_string()))
        }
    }

    /// Parse an algorithm-qualified reference such as a manifest `blobSum`.
    pub fn from_reference(raw: &str) -> Result<Self, DigestError> {
        match raw.split_once(':') {
            Some(("sha256", hex)) => Self::from_hex(hex),
            Some(_) => Err(DigestError::UnsupportedAlgorithm(raw.to_string())),
            None => Err(DigestError::Malformed(raw.to_string())),
        }
    }

    #[must_use]
    pub fn hex(&self) -> &str {
        &self.0
    }

    /// `sha256:<hex>`, the form used in API paths.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{SHA256_PREFIX}{}", self.0)
    }

    /// Two-character shard directory under `blobs/sha256/`.
    #[must_use]
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for BlobDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            Self::from_reference(s)
        } else {
            Self::from_hex(s)
        }
    }
}

impl TryFrom<String> for BlobDigest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlobDigest> for String {
    fn from(value: BlobDigest) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn sample() -> String {
        hex::encode(Sha256::digest(b"layer"))
    }

    #[test]
    fn bare_and_qualified_forms_agree() {
        let hex = sample();
        let bare = BlobDigest::from_hex(&hex).unwrap();
        let qualified = BlobDigest::from_reference(&format!("sha256:{hex}")).unwrap();
        assert_eq!(bare, qualified);
        assert_eq!(bare.reference(), format!("sha256:{hex}"));
        assert_eq!(bare.shard(), &hex[..2]);
    }

    #[test]
    fn rejects_path_like_and_uppercase_values() {
        assert!(BlobDigest::from_hex("../../etc").is_err());
        assert!(BlobDigest::from_hex(&sample().to_uppercase()).is_err());
        assert!(BlobDigest::from_hex(&sample()[1..]).is_err());
    }

    #[test]
    fn other_algorithms_are_reported_as_unsupported() {
        let err = BlobDigest::from_reference("sha512:abcd").unwrap_err();
        assert!(matches!(err, DigestError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn serde_uses_the_bare_hex_form() {
        let digest = BlobDigest::from_hex(&sample()).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", sample()));
        let back: BlobDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
