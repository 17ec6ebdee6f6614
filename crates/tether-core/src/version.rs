//! Module version parsing, comparison, and range matching.
//!
//! Versions have the form `major[.minor[.micro[.qualifier]]]`:
//! - missing numeric parts default to `0`, a missing qualifier is empty
//! - numeric parts compare as numbers, the qualifier compares lexically
//! - `1.0` and `1.0.0` are the same version

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// A parsed module version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Parse a version string such as `1`, `1.2`, `1.2.3` or `1.2.3.beta`.
    pub fn parse(version: &str) -> Result<Self, ModelError> {
        let s = version.trim();
        if s.is_empty() {
            return Err(invalid(version, "empty version"));
        }

        let mut parts = s.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for (i, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(token) => {
                    *slot = token.parse::<u64>().map_err(|_| {
                        invalid(version, &format!("segment {} is not a number", i + 1))
                    })?;
                }
                None => break,
            }
        }
        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(version, "qualifier has invalid characters"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

fn invalid(version: &str, reason: &str) -> ModelError {
    ModelError::InvalidVersion {
        version: version.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for Version {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version range expression.
///
/// Supports: `[1.0,2.0)`, `(1.0,2.0]`, `[1.0,2.0]`, `(1.0,2.0)` and a bare
/// version `1.0`, which means "1.0 or higher".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Bound,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl VersionRange {
    /// Parse a version range string.
    pub fn parse(spec: &str) -> Result<Self, ModelError> {
        let s = spec.trim();
        if !s.starts_with('[') && !s.starts_with('(') {
            return Ok(VersionRange {
                lower: Bound {
                    version: Version::parse(s)?,
                    inclusive: true,
                },
                upper: None,
            });
        }

        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        if s.len() < 2 || !(s.ends_with(']') || s.ends_with(')')) {
            return Err(invalid(spec, "unterminated range"));
        }
        let inner = &s[1..s.len() - 1];
        let Some((lower, upper)) = inner.split_once(',') else {
            return Err(invalid(spec, "range needs a lower and an upper bound"));
        };

        Ok(VersionRange {
            lower: Bound {
                version: Version::parse(lower)?,
                inclusive: open_inclusive,
            },
            upper: Some(Bound {
                version: Version::parse(upper)?,
                inclusive: close_inclusive,
            }),
        })
    }

    /// Check if a version satisfies this range.
    pub fn contains(&self, version: &Version) -> bool {
        let cmp = version.cmp(&self.lower.version);
        if self.lower.inclusive {
            if cmp == Ordering::Less {
                return false;
            }
        } else if cmp != Ordering::Greater {
            return false;
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// Render the range as an LDAP filter over `attr`.
    pub fn to_filter(&self, attr: &str) -> String {
        let lower = if self.lower.inclusive {
            format!("({attr}>={})", self.lower.version)
        } else {
            format!("(!({attr}<={}))", self.lower.version)
        };
        match &self.upper {
            None => lower,
            Some(upper) => {
                let upper = if upper.inclusive {
                    format!("({attr}<={})", upper.version)
                } else {
                    format!("(!({attr}>={}))", upper.version)
                };
                format!("(&{lower}{upper})")
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            None => write!(f, "{}", self.lower.version),
            Some(upper) => write!(
                f,
                "{}{},{}{}",
                if self.lower.inclusive { '[' } else { '(' },
                self.lower.version,
                upper.version,
                if upper.inclusive { ']' } else { ')' }
            ),
        }
    }
}
