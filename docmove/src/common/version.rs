use crate::errors::{ErrorKind, MoveError, MoveResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A dotted numeric changeset version such as `0`, `0.1` or `2.10.3`.
///
/// Versions compare segment by segment as numbers, so `0.10` sorts after `0.9`.
/// Missing trailing segments count as zero: `1` and `1.0` are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> MoveResult<Version> {
        if raw.is_empty() {
            return Err(MoveError::new(
                "Version must not be empty",
                ErrorKind::InvalidChangesetName,
            ));
        }

        let mut segments = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(MoveError::new(
                    &format!("Invalid version '{}': segments must be numeric", raw),
                    ErrorKind::InvalidChangesetName,
                ));
            }
            let value = segment.parse::<u64>().map_err(|e| {
                MoveError::new(
                    &format!("Invalid version '{}': {}", raw, e),
                    ErrorKind::InvalidChangesetName,
                )
            })?;
            segments.push(value);
        }

        Ok(Version {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let left = self.segments.get(i).copied().unwrap_or(0);
            let right = other.segments.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Version {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = MoveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}
