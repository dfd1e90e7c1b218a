//! Dotted version strings reduced to a single ordered numeric key.
//!
//! Segment `i` (0-based) is weighted by `0.01^(i - 1)`: the first segment
//! counts 100, the second 1, the third 0.01 and so on. Major differences
//! therefore dominate, e.g. `1.9.0` (109) sorts before `1.10.0` (110).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::VersionError;

/// A parsed dotted-decimal version. Immutable once parsed.
///
/// Equality and ordering both go through [`numeric_key`](Self::numeric_key),
/// so `1.0` equals `1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        if version.is_empty() {
            return Err(VersionError::Empty);
        }

        let segments = version
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidSegment {
                        version: version.to_string(),
                        segment: segment.to_string(),
                    });
                }
                segment
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidSegment {
                        version: version.to_string(),
                        segment: segment.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: version.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Weighted sum of all segments.
    pub fn numeric_key(&self) -> f64 {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, &segment)| segment as f64 * 0.01f64.powi(i as i32 - 1))
            .sum()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.numeric_key() == other.numeric_key()
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.numeric_key().partial_cmp(&other.numeric_key())
    }
}

/// Parse `version` and return its numeric key.
pub fn numeric_key(version: &str) -> Result<f64, VersionError> {
    Version::parse(version).map(|v| v.numeric_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_segment_dominates() {
        assert!(numeric_key("1.9.0").unwrap() < numeric_key("1.10.0").unwrap());
        assert!(numeric_key("1.99.99").unwrap() < numeric_key("2.0.0").unwrap());
    }

    #[test]
    fn test_ordering_between_neighbours() {
        let lower = numeric_key("1.1.9").unwrap();
        let mid = numeric_key("1.2.0").unwrap();
        let upper = numeric_key("1.3.0").unwrap();
        assert!(lower < mid && mid < upper);
    }

    #[test]
    fn test_weights() {
        assert_eq!(numeric_key("3").unwrap(), 300.0);
        assert_eq!(numeric_key("2.5").unwrap(), 205.0);
        assert!((numeric_key("2.5.7").unwrap() - 205.07).abs() < 1e-9);
    }

    #[test]
    fn test_equal_strings_have_equal_keys() {
        assert_eq!(numeric_key("2.4.21").unwrap(), numeric_key("2.4.21").unwrap());
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(numeric_key(""), Err(VersionError::Empty));
        assert!(matches!(
            numeric_key("1.x.0"),
            Err(VersionError::InvalidSegment { ref segment, .. }) if segment == "x"
        ));
        assert!(numeric_key("1..0").is_err());
        assert!(numeric_key("2.4.3-beta").is_err());
        assert!(numeric_key("+1.0").is_err());
    }

    #[test]
    fn test_version_partial_ord() {
        let a: Version = "2.3.0".parse().unwrap();
        let b: Version = "2.10.1".parse().unwrap();
        assert!(a < b);
        assert_eq!(b.segments(), &[2, 10, 1]);
        assert_eq!(b.to_string(), "2.10.1");
    }

    #[test]
    fn test_equality_agrees_with_ordering() {
        let pairs = [("1.0", "1.0.0"), ("01.0", "1.0"), ("2.5", "2.5.0.0")];
        for (a, b) in pairs {
            let a: Version = a.parse().unwrap();
            let b: Version = b.parse().unwrap();
            assert_eq!(a, b);
            assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
            assert_ne!(a.as_str(), b.as_str());
        }

        let a: Version = "1.2".parse().unwrap();
        let b: Version = "1.2.1".parse().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
    }
}
