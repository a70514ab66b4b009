use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Represents a reference to an artifact in an OCI registry.
///
/// A reference always carries an explicit tag or digest; `repo` without
/// a version qualifier is rejected rather than defaulted to `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Repository path, including the registry host (e.g. `ghcr.io/org/repo`)
    pub repository: String,
    /// Tag or digest
    pub reference: String,
}

impl ImageReference {
    /// Parse an image reference of the form `repo:tag` or `repo@digest`.
    ///
    /// The separator must occur after the final `/` so that registry
    /// ports (`localhost:5000/repo:tag`) are not mistaken for a tag.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let slash = s.rfind('/').map(|i| i as isize).unwrap_or(-1);

        let split = match s.rfind('@') {
            Some(i) if i as isize > slash => Some(i),
            _ => match s.rfind(':') {
                Some(i) if i as isize > slash => Some(i),
                _ => None,
            },
        };

        let Some(i) = split else {
            return Err(Error::InvalidReference(s.to_string()));
        };

        let repository = &s[..i];
        let reference = &s[i + 1..];
        if repository.is_empty() || reference.is_empty() {
            return Err(Error::InvalidReference(s.to_string()));
        }

        Ok(ImageReference {
            repository: repository.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Registry host: the first path segment of the repository.
    pub fn registry(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(host, _)| host)
            .unwrap_or(&self.repository)
    }

    /// True when the reference part is a digest rather than a tag.
    pub fn is_digest(&self) -> bool {
        self.reference.contains(':')
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageReference::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}{}{}", self.repository, sep, self.reference)
    }
}

/// Derive the local folder name for a reference: the final path segment,
/// optionally with a trailing `:version` removed.
pub fn local_name(reference: &str, strip_version: bool) -> String {
    let value = match reference.rfind('/') {
        Some(i) => &reference[i + 1..],
        None => reference,
    };
    if strip_version {
        trim_version(value).to_string()
    } else {
        value.to_string()
    }
}

/// Remove a trailing `:version` qualifier from a folder name.
pub fn trim_version(value: &str) -> &str {
    match value.split_once(':') {
        Some((name, _)) => name,
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_reference() {
        let r = ImageReference::parse("ghcr.io/org/repo:1.2.3").unwrap();
        assert_eq!(r.repository, "ghcr.io/org/repo");
        assert_eq!(r.reference, "1.2.3");
        assert_eq!(r.registry(), "ghcr.io");
        assert!(!r.is_digest());
    }

    #[test]
    fn parses_digest_reference() {
        let r = ImageReference::parse(
            "ghcr.io/org/repo@sha256:f29dba55022eec8c0ce1cbfaaed45f2352ab3fbbb1cdcd5ea30ca3513deb70c9",
        )
        .unwrap();
        assert_eq!(r.repository, "ghcr.io/org/repo");
        assert!(r.is_digest());
    }

    #[test]
    fn port_is_not_a_tag() {
        // the colon in the port must not satisfy the tag requirement
        assert!(ImageReference::parse("localhost:5000/repo").is_err());

        let r = ImageReference::parse("localhost:5000/repo:1.0").unwrap();
        assert_eq!(r.repository, "localhost:5000/repo");
        assert_eq!(r.reference, "1.0");
        assert_eq!(r.registry(), "localhost:5000");
    }

    #[test]
    fn missing_tag_is_rejected() {
        assert!(ImageReference::parse("ghcr.io/org/repo").is_err());
        assert!(ImageReference::parse("repo").is_err());
    }

    #[test]
    fn empty_tag_is_rejected() {
        assert!(ImageReference::parse("ghcr.io/org/repo:").is_err());
        assert!(ImageReference::parse("ghcr.io/org/repo@").is_err());
    }

    #[test]
    fn local_name_strips_version() {
        assert_eq!(local_name("ghcr.io/org/repo:1.2.3", true), "repo");
        assert_eq!(local_name("ghcr.io/org/repo:1.2.3", false), "repo:1.2.3");
    }

    #[test]
    fn local_name_without_path() {
        assert_eq!(local_name("repo:1.0", false), "repo:1.0");
        assert_eq!(local_name("repo", true), "repo");
    }
}
