//! Immutable resource addresses.

use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Segment that matches any single segment when a path is used as a pattern.
const WILDCARD: &str = "*";

/// Ordered sequence of path segments identifying a resource.
///
/// Paths are consumed left to right during traversal. Sub-paths share the
/// parent's segment storage and only advance an offset, so
/// [`ResourcePath::sub_path`] never copies or mutates the receiver.
///
/// The string form is canonical: a leading `/`, segments joined by `/`, and
/// empty segments dropped. `"/"` is the empty path.
#[derive(Clone)]
pub struct ResourcePath {
    segments: Arc<[String]>,
    offset: usize,
}

impl ResourcePath {
    /// Returns the empty path addressing the container root.
    #[must_use]
    pub fn root() -> Self {
        Self::from_segments(Vec::<String>::new())
    }

    /// Parses a `/`-delimited path, ignoring empty segments.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self::from_segments(path.split('/').filter(|segment| !segment.is_empty()))
    }

    /// Builds a path from pre-split segments.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collected: Vec<String> = segments.into_iter().map(Into::into).collect();
        Self {
            segments: Arc::from(collected),
            offset: 0,
        }
    }

    /// Remaining segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        self.segments.get(self.offset..).unwrap_or_default()
    }

    /// First unconsumed segment, or `None` at the traversal tail.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.segments().first().map(String::as_str)
    }

    /// Final segment of the path.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments().last().map(String::as_str)
    }

    /// Path without its head. The receiver is left untouched.
    #[must_use]
    pub fn sub_path(&self) -> Self {
        Self {
            segments: Arc::clone(&self.segments),
            offset: self.offset.saturating_add(1).min(self.segments.len()),
        }
    }

    /// Returns `true` once every segment has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments().is_empty()
    }

    /// Number of remaining segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments().len()
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments().to_vec();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Returns the path without its final segment, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments().split_last()?;
        Some(Self::from_segments(init.iter().cloned()))
    }

    /// Returns `true` when `prefix` addresses this path or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments().starts_with(prefix.segments())
    }

    /// Tests `candidate` against this path used as a pattern.
    ///
    /// A `*` segment matches exactly one segment of any value.
    #[must_use]
    pub fn matches(&self, candidate: &Self) -> bool {
        self.len() == candidate.len()
            && self
                .segments()
                .iter()
                .zip(candidate.segments())
                .all(|(pattern, segment)| pattern == WILDCARD || pattern == segment)
    }
}

impl Default for ResourcePath {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for ResourcePath {
    fn eq(&self, other: &Self) -> bool {
        self.segments() == other.segments()
    }
}

impl Eq for ResourcePath {}

impl Hash for ResourcePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments().hash(state);
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return formatter.write_str("/");
        }
        for segment in self.segments() {
            write!(formatter, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ResourcePath({self})")
    }
}

impl FromStr for ResourcePath {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(input))
    }
}

impl From<&str> for ResourcePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for ResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourcePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}
