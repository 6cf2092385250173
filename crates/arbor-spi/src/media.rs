//! Media types negotiated between subscribers and codecs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A `type/subtype` media type, normalised to lower case.
///
/// Parameters such as `charset` are discarded; codec selection depends only
/// on the essence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    kind: String,
    subtype: String,
}

/// Errors raised while parsing a [`MediaType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    /// The input lacked a `/` separator or one of its halves.
    #[error("malformed media type '{0}'")]
    Malformed(String),
}

impl MediaType {
    /// Builds a media type from its two halves.
    #[must_use]
    pub fn new(kind: &str, subtype: &str) -> Self {
        Self {
            kind: kind.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
        }
    }

    /// `application/json`.
    #[must_use]
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// Parses `type/subtype[; parameters]`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaTypeError::Malformed`] when either half is missing.
    pub fn parse(input: &str) -> Result<Self, MediaTypeError> {
        let essence = input.split(';').next().unwrap_or_default();
        match essence.split_once('/') {
            Some((kind, subtype)) if !kind.trim().is_empty() && !subtype.trim().is_empty() => {
                Ok(Self::new(kind, subtype))
            }
            _ => Err(MediaTypeError::Malformed(input.to_owned())),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.kind, self.subtype)
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
