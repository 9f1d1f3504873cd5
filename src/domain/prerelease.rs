//! Pre-release markers attached to a parsed version
//!
//! Supports the alpha, beta and release-candidate phases with an iteration
//! number, e.g. `rc1`, `a2`, `b0`. Spelling variants (`alpha`, `beta`, `c`,
//! `pre`, `preview`) normalize to the short forms.

use std::fmt;
use std::str::FromStr;

/// Pre-release phase. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseType {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreReleaseType {
    /// Spellings accepted in tags, longest first so that prefixes
    /// (`a` vs `alpha`, `pre` vs `preview`) resolve to the longer match.
    pub const SPELLINGS: &'static [(&'static str, PreReleaseType)] = &[
        ("preview", PreReleaseType::ReleaseCandidate),
        ("alpha", PreReleaseType::Alpha),
        ("beta", PreReleaseType::Beta),
        ("pre", PreReleaseType::ReleaseCandidate),
        ("rc", PreReleaseType::ReleaseCandidate),
        ("a", PreReleaseType::Alpha),
        ("b", PreReleaseType::Beta),
        ("c", PreReleaseType::ReleaseCandidate),
    ];
}

impl FromStr for PreReleaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == lower)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| format!("Invalid pre-release identifier: '{}'", s))
    }
}

impl fmt::Display for PreReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreReleaseType::Alpha => write!(f, "a"),
            PreReleaseType::Beta => write!(f, "b"),
            PreReleaseType::ReleaseCandidate => write!(f, "rc"),
        }
    }
}

/// Pre-release marker with its iteration number
///
/// # Examples
/// - "rc1" -> PreRelease { identifier: ReleaseCandidate, iteration: 1 }
/// - "alpha" -> PreRelease { identifier: Alpha, iteration: 0 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub identifier: PreReleaseType,
    pub iteration: u64,
}

impl PreRelease {
    pub fn new(identifier: PreReleaseType, iteration: u64) -> Self {
        PreRelease {
            identifier,
            iteration,
        }
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.identifier, self.iteration)
    }
}
