use std::fmt;

use regex::Regex;

use crate::domain::version::ParsedVersion;
use crate::error::{MirrorError, Result};

/// A tag whose name parsed into a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub name: String,
    pub version: ParsedVersion,
}

impl ParsedTag {
    pub fn new(name: impl Into<String>, version: ParsedVersion) -> Self {
        ParsedTag {
            name: name.into(),
            version,
        }
    }
}

/// A tag string that could not be parsed as a version.
///
/// Malformed tags are data: they are reported and purged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTag {
    /// The tag exactly as it was stored
    pub raw: String,
    pub reason: String,
}

impl MalformedTag {
    pub fn new(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        MalformedTag {
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MalformedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.raw, self.reason)
    }
}

impl From<MalformedTag> for MirrorError {
    fn from(tag: MalformedTag) -> Self {
        MirrorError::MalformedTag {
            tag: tag.raw,
            reason: tag.reason,
        }
    }
}

/// Shell-style tag glob (`*` matches any run of characters, `?` one character)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGlob {
    pub pattern: String,
}

impl TagGlob {
    pub fn new(pattern: impl Into<String>) -> Self {
        TagGlob {
            pattern: pattern.into(),
        }
    }

    /// Compile the glob into an anchored regex
    pub fn to_regex(&self) -> Result<Regex> {
        let escaped = regex::escape(&self.pattern);
        let regex_pattern = escaped.replace(r"\*", ".*").replace(r"\?", ".");

        Regex::new(&format!("^{}$", regex_pattern)).map_err(|e| {
            MirrorError::tag(format!("Invalid tag pattern '{}': {}", self.pattern, e))
        })
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.to_regex().map(|re| re.is_match(tag)).unwrap_or(false)
    }
}

/// Which tags a describe may anchor on: any include glob matches and no
/// exclude glob does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeFilter {
    pub include: Vec<TagGlob>,
    pub exclude: Vec<TagGlob>,
}

impl DescribeFilter {
    pub fn new(include: &[&str], exclude: &[&str]) -> Self {
        DescribeFilter {
            include: include.iter().map(|p| TagGlob::new(*p)).collect(),
            exclude: exclude.iter().map(|p| TagGlob::new(*p)).collect(),
        }
    }

    /// `v*` or dotted tags, skipping release candidates (`*-r*`)
    pub fn release_tags() -> Self {
        Self::new(&["v*", "*.*"], &["*-r*"])
    }

    pub fn accepts(&self, tag: &str) -> bool {
        self.include.iter().any(|g| g.matches(tag)) && !self.exclude.iter().any(|g| g.matches(tag))
    }
}

impl Default for DescribeFilter {
    fn default() -> Self {
        Self::release_tags()
    }
}
