use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Interpreter version, ordered lexicographically by `(major, minor, patch)`.
///
/// `2.7` and `2.7.0` are the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self {
            major,
            minor,
            patch: 0,
        }
    }

    pub const fn with_patch(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },

    #[error("too many version components in '{input}' (expected major[.minor[.patch]])")]
    TooManyComponents { input: String },
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = [0u16; 3];
        let mut count = 0;
        for component in input.split('.') {
            if count == parts.len() {
                return Err(VersionError::TooManyComponents {
                    input: input.to_string(),
                });
            }
            parts[count] =
                component
                    .parse::<u16>()
                    .map_err(|_| VersionError::InvalidComponent {
                        input: input.to_string(),
                        component: component.to_string(),
                    })?;
            count += 1;
        }

        Ok(Version::with_patch(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid target range: floor {min} is above ceiling {max}")]
    Inverted { min: Version, max: Version },
}

/// Inclusive span of interpreter versions the output must run on.
///
/// The floor is mandatory: fixers decide whether to run by comparing their
/// applicable-from version against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VersionRange {
    min: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<Version>,
}

impl VersionRange {
    pub fn new(min: Version, max: Option<Version>) -> Result<Self, RangeError> {
        if let Some(max) = max
            && min > max
        {
            return Err(RangeError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Range with a floor and no ceiling.
    pub fn from_floor(min: Version) -> Self {
        Self { min, max: None }
    }

    pub fn min(&self) -> Version {
        self.min
    }

    pub fn max(&self) -> Option<Version> {
        self.max
    }

    /// True iff a feature introduced at `introduced` is usable unmodified by every
    /// version in the range, i.e. it predates or equals the floor.
    pub fn supports(&self, introduced: Version) -> bool {
        introduced <= self.min
    }

    pub fn contains(&self, version: Version) -> bool {
        version >= self.min && self.max.is_none_or(|max| version <= max)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, ">={}", self.min),
        }
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            min: Version,
            #[serde(default)]
            max: Option<Version>,
        }

        let raw = Raw::deserialize(deserializer)?;
        VersionRange::new(raw.min, raw.max).map_err(serde::de::Error::custom)
    }
}
