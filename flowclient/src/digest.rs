use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::Error;

/// Represents an OCI content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OciDigest {
    algorithm: String,
    hex: String,
}

impl OciDigest {
    /// Compute the sha256 digest of the given bytes.
    pub fn from_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self {
            algorithm: "sha256".to_string(),
            hex: hex::encode(hasher.finalize()),
        }
    }

    /// Get the algorithm part of the digest
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Get the hex part of the digest
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for OciDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for OciDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidDigest(s.to_string()))?;

        // Only sha256 is supported
        if algorithm != "sha256" {
            return Err(Error::InvalidDigest(s.to_string()));
        }

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidDigest(s.to_string()));
        }

        Ok(OciDigest {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }
}

impl serde::Serialize for OciDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for OciDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OciDigest::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = OciDigest::from_bytes(b"flow content");
        let b = OciDigest::from_bytes(b"flow content");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = OciDigest::from_bytes(b"flow content");
        let b = OciDigest::from_bytes(b"flow content!");
        assert_ne!(a, b);
    }

    #[test]
    fn parses_valid_digest() {
        let digest = OciDigest::from_bytes(b"x");
        let parsed: OciDigest = digest.to_string().parse().unwrap();
        assert_eq!(digest, parsed);
        assert_eq!(parsed.algorithm(), "sha256");
    }

    #[test]
    fn rejects_malformed_digests() {
        assert!("sha256".parse::<OciDigest>().is_err());
        assert!("md5:abcd".parse::<OciDigest>().is_err());
        assert!("sha256:".parse::<OciDigest>().is_err());
        assert!("sha256:zzzz".parse::<OciDigest>().is_err());
    }
}
