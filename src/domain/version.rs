//! Parsed versions, their tuple encoding, and version composition
//!
//! Tags produced by upstream projects and by `git describe` are parsed into a
//! [ParsedVersion]: an optional epoch, a dotted release, an optional
//! pre-release marker, an optional post-release counter (commits since the
//! nearest tag), an optional development counter and an optional local label.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::domain::prerelease::{PreRelease, PreReleaseType};
use crate::domain::tag::MalformedTag;

/// One dot-separated part of a local label (`+ubuntu.1` has two)
///
/// Text parts sort below numeric parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LocalSegment {
    Text(String),
    Number(u64),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::Text(text) => write!(f, "{}", text),
            LocalSegment::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Where the pre-release slot places a version among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreRelease),
    Final,
}

/// Structured, totally ordered version value.
///
/// Epochs compare first. Release components compare after padding the shorter
/// one with zeros, so `0.0` and `0.0.0` are equal. At equal releases the order
/// is `1.0.dev1 < 1.0a1 < 1.0 < 1.0.post1`, and a version with a local label
/// sorts just above the same version without one.
#[derive(Debug, Clone)]
pub struct ParsedVersion {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<PreRelease>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<Vec<LocalSegment>>,
}

impl ParsedVersion {
    /// Create a plain release version. `release` must not be empty.
    pub fn new(release: Vec<u64>) -> Self {
        debug_assert!(!release.is_empty(), "release must have a component");
        ParsedVersion {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    pub fn with_pre(mut self, pre: PreRelease) -> Self {
        self.pre = Some(pre);
        self
    }

    pub fn with_post(mut self, post: u64) -> Self {
        self.post = Some(post);
        self
    }

    /// Parse a raw tag (e.g. "v1.0.1-265-g5f0c7a7" -> 1.0.1.post265).
    ///
    /// A single leading `v` is dropped and anything from the first `-g`
    /// (a describe hash suffix) onwards is discarded before parsing.
    pub fn parse(raw: &str) -> Result<Self, MalformedTag> {
        let trimmed = raw.trim();
        let unprefixed = trimmed
            .strip_prefix(|c: char| c == 'v' || c == 'V')
            .unwrap_or(trimmed);
        let data = match unprefixed.find("-g") {
            Some(index) => &unprefixed[..index],
            None => unprefixed,
        };

        if !data.chars().any(|c| c.is_ascii_digit()) {
            return Err(MalformedTag::new(
                raw,
                "legacy version string without a numeric release",
            ));
        }

        let lower = data.to_ascii_lowercase();
        Scanner::new(&lower)
            .version()
            .map_err(|reason| MalformedTag::new(raw, reason))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<PreRelease> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> Option<&[LocalSegment]> {
        self.local.as_deref()
    }

    /// True for the canonical `0.0` anchor: release exactly `[0, 0]` and
    /// nothing else set.
    pub fn is_baseline(&self) -> bool {
        self.epoch == 0
            && self.release == [0, 0]
            && self.pre.is_none()
            && self.post.is_none()
            && self.dev.is_none()
            && self.local.is_none()
    }

    /// Tuple encoding used in generated package metadata.
    ///
    /// Only the release and post slot are encoded. Epoch, pre-release,
    /// development and local parts are dropped.
    pub fn to_tuple(&self) -> VersionTuple {
        VersionTuple::from(self)
    }

    /// The release components alone, rendered as a Python tuple: `(1, 0)`,
    /// or `(1,)` for a single component.
    pub fn release_tuple(&self) -> String {
        match self.release.as_slice() {
            [only] => format!("({},)", only),
            release => {
                let parts: Vec<String> = release.iter().map(|n| n.to_string()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some(pre), _, _) => PreKey::Pre(pre),
            (None, _, _) => PreKey::Final,
        }
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let epoch = self.epoch.cmp(&other.epoch);
        if epoch != Ordering::Equal {
            return epoch;
        }

        let width = self.release.len().max(other.release.len());
        for i in 0..width {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        // A missing dev counter sorts above any present one
        let dev = match (self.dev, other.dev) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        };

        self.pre_key()
            .cmp(&other.pre_key())
            .then_with(|| self.post.cmp(&other.post))
            .then(dev)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ParsedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParsedVersion {}

impl FromStr for ParsedVersion {
    type Err = MalformedTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParsedVersion::parse(s)
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if let Some(pre) = self.pre {
            write!(f, "{}", pre)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }
        if let Some(local) = &self.local {
            let parts: Vec<String> = local.iter().map(|s| s.to_string()).collect();
            write!(f, "+{}", parts.join("."))?;
        }
        Ok(())
    }
}

/// Release components followed by the post-release slot.
///
/// Rendered like a Python tuple (`(1, 0, 1, 265)`, `(0, 0, None)`) because the
/// generated packages embed it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTuple {
    pub release: Vec<u64>,
    pub post: Option<u64>,
}

impl VersionTuple {
    /// Elements with the post slot first, least significant release next.
    fn reversed(&self) -> Vec<Option<u64>> {
        std::iter::once(self.post)
            .chain(self.release.iter().rev().map(|n| Some(*n)))
            .collect()
    }
}

impl From<&ParsedVersion> for VersionTuple {
    fn from(version: &ParsedVersion) -> Self {
        VersionTuple {
            release: version.release.clone(),
            post: version.post,
        }
    }
}

impl fmt::Display for VersionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        parts.push(match self.post {
            Some(post) => post.to_string(),
            None => "None".to_string(),
        });
        write!(f, "({})", parts.join(", "))
    }
}

/// Combine the tool version and the data version into one version that moves
/// forward whenever either input does.
///
/// Both tuples are reversed (post slot first), the shorter is zero-padded on
/// the most significant side and the two are summed position by position. A
/// position where neither side has a value is dropped, so two versions without
/// post counters fold their least significant release sum into the post slot:
///
/// `1.2` + `3.4.5` = `3.5.post7`
///
/// Pre-release markers do not take part. The inputs must leave at least one
/// release component after folding; two single-component versions without
/// post counters violate that and panic.
pub fn compose(tool: &ParsedVersion, data: &ParsedVersion) -> ParsedVersion {
    let mut a = tool.to_tuple().reversed();
    let mut b = data.to_tuple().reversed();

    let width = a.len().max(b.len());
    a.resize(width, Some(0));
    b.resize(width, Some(0));

    let summed: Vec<u64> = a
        .into_iter()
        .zip(b)
        .filter_map(|pair| match pair {
            (None, None) => None,
            (x, y) => Some(x.unwrap_or(0).saturating_add(y.unwrap_or(0))),
        })
        .collect();

    assert!(
        summed.len() >= 2,
        "composing {} with {} leaves no release component",
        tool,
        data
    );

    let release: Vec<u64> = summed[1..].iter().rev().copied().collect();
    ParsedVersion::new(release).with_post(summed[0])
}

/// Cursor over a lower-cased, prefix-stripped version string.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn next_is_digit(&self, offset: usize) -> bool {
        self.rest()
            .as_bytes()
            .get(offset)
            .is_some_and(|b| b.is_ascii_digit())
    }

    fn eat_separator(&mut self) -> bool {
        match self.rest().chars().next() {
            Some('.') | Some('-') | Some('_') => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.rest().starts_with(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<Result<u64, String>> {
        let digits = self.rest().bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let text = &self.rest()[..digits];
        self.pos += digits;
        Some(
            text.parse::<u64>()
                .map_err(|_| format!("number '{}' is out of range", text)),
        )
    }

    /// Optional separator followed by a number; rewinds when no number follows.
    fn separated_number(&mut self) -> Result<Option<u64>, String> {
        let start = self.pos;
        self.eat_separator();
        match self.number() {
            Some(n) => n.map(Some),
            None => {
                self.pos = start;
                Ok(None)
            }
        }
    }

    fn version(mut self) -> Result<ParsedVersion, String> {
        let epoch = self.epoch()?;

        let mut release = Vec::new();
        match self.number() {
            Some(n) => release.push(n?),
            None => return Err("release must start with a digit".to_string()),
        }
        while self.rest().starts_with('.') && self.next_is_digit(1) {
            self.pos += 1;
            if let Some(n) = self.number() {
                release.push(n?);
            }
        }

        let mut version = ParsedVersion::new(release);
        version.epoch = epoch;
        version.pre = self.pre_release()?;
        version.post = self.post_release()?;
        version.dev = self.dev_release()?;
        version.local = self.local()?;

        if !self.rest().is_empty() {
            return Err(format!("unexpected trailing input '{}'", self.rest()));
        }
        Ok(version)
    }

    /// `N!` prefix; absent means epoch 0.
    fn epoch(&mut self) -> Result<u64, String> {
        let digits = self.rest().bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || self.rest().as_bytes().get(digits) != Some(&b'!') {
            return Ok(0);
        }
        let epoch = self.number().transpose()?.unwrap_or(0);
        self.pos += 1;
        Ok(epoch)
    }

    fn pre_release(&mut self) -> Result<Option<PreRelease>, String> {
        let start = self.pos;
        self.eat_separator();
        for (spelling, kind) in PreReleaseType::SPELLINGS {
            if self.eat_keyword(spelling) {
                let iteration = self.separated_number()?.unwrap_or(0);
                return Ok(Some(PreRelease::new(*kind, iteration)));
            }
        }
        self.pos = start;
        Ok(None)
    }

    fn post_release(&mut self) -> Result<Option<u64>, String> {
        // `-N` is the commit distance emitted by describe
        if self.rest().starts_with('-') && self.next_is_digit(1) {
            self.pos += 1;
            return self.number().transpose();
        }

        let start = self.pos;
        self.eat_separator();
        for keyword in ["post", "rev", "r"] {
            if self.eat_keyword(keyword) {
                return Ok(Some(self.separated_number()?.unwrap_or(0)));
            }
        }
        self.pos = start;
        Ok(None)
    }

    fn dev_release(&mut self) -> Result<Option<u64>, String> {
        let start = self.pos;
        self.eat_separator();
        if self.eat_keyword("dev") {
            return Ok(Some(self.separated_number()?.unwrap_or(0)));
        }
        self.pos = start;
        Ok(None)
    }

    /// `+label` with alphanumeric parts split on `.`, `-` or `_`.
    fn local(&mut self) -> Result<Option<Vec<LocalSegment>>, String> {
        if !self.rest().starts_with('+') {
            return Ok(None);
        }
        self.pos += 1;

        let mut segments = Vec::new();
        loop {
            let len = self
                .rest()
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric())
                .count();
            if len == 0 {
                return Err("local version label has an empty part".to_string());
            }
            let text = &self.rest()[..len];
            let segment = if text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse::<u64>()
                    .map(LocalSegment::Number)
                    .map_err(|_| format!("number '{}' is out of range", text))?
            } else {
                LocalSegment::Text(text.to_string())
            };
            segments.push(segment);
            self.pos += len;

            if !self.eat_separator() {
                break;
            }
        }
        Ok(Some(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ParsedVersion {
        ParsedVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_release_lengths() {
        assert_eq!(v("1").release(), &[1]);
        assert_eq!(v("1.2").release(), &[1, 2]);
        assert_eq!(v("v1.2.3").release(), &[1, 2, 3]);
        assert_eq!(v("1.2.3.4").release(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_strips_describe_hash() {
        let parsed = v("v1.0.1-265-g5f0c7a7");
        assert_eq!(parsed.release(), &[1, 0, 1]);
        assert_eq!(parsed.post(), Some(265));
        assert_eq!(parsed.pre(), None);
        assert_eq!(parsed.to_string(), "1.0.1.post265");
    }

    #[test]
    fn test_parse_rc_suffix() {
        let parsed = v("v0.0.0-rc1");
        assert_eq!(parsed.release(), &[0, 0, 0]);
        assert_eq!(
            parsed.pre(),
            Some(PreRelease::new(PreReleaseType::ReleaseCandidate, 1))
        );
        assert_eq!(parsed.to_string(), "0.0.0rc1");
    }

    #[test]
    fn test_parse_pre_and_post_spellings() {
        assert_eq!(v("1.0a1").to_string(), "1.0a1");
        assert_eq!(v("1.0-beta.2").to_string(), "1.0b2");
        assert_eq!(v("1.0rc").to_string(), "1.0rc0");
        assert_eq!(v("3.5.post7").to_string(), "3.5.post7");
        assert_eq!(v("3.5-post-7").to_string(), "3.5.post7");
        assert_eq!(v("1.0.rev3").to_string(), "1.0.post3");
        assert_eq!(v("1.0rc1-4").to_string(), "1.0rc1.post4");
    }

    #[test]
    fn test_parse_uppercase() {
        assert_eq!(v("V1.0RC2").to_string(), "1.0rc2");
    }

    #[test]
    fn test_parse_malformed() {
        for raw in ["not-a-version", "", "release", "1.0+", "1.0+ubuntu..1", "1!", "1..2"] {
            let err = ParsedVersion::parse(raw).unwrap_err();
            assert_eq!(err.raw, raw);
            assert!(!err.reason.is_empty());
        }
    }

    #[test]
    fn test_parse_legacy_reason_differs() {
        let legacy = ParsedVersion::parse("not-a-version").unwrap_err();
        let invalid = ParsedVersion::parse("1.0-final").unwrap_err();
        assert!(legacy.reason.contains("legacy"));
        assert!(!invalid.reason.contains("legacy"));
    }

    #[test]
    fn test_parse_dev_epoch_and_local() {
        let dev = v("v1.0.dev3");
        assert_eq!(dev.release(), &[1, 0]);
        assert_eq!(dev.dev(), Some(3));
        assert_eq!(dev.to_string(), "1.0.dev3");

        let epoch = v("1!2.0");
        assert_eq!(epoch.epoch(), 1);
        assert_eq!(epoch.release(), &[2, 0]);
        assert_eq!(epoch.to_string(), "1!2.0");

        let local = v("v2.0+Local-1");
        assert_eq!(
            local.local(),
            Some(
                &[
                    LocalSegment::Text("local".to_string()),
                    LocalSegment::Number(1)
                ][..]
            )
        );
        assert_eq!(local.to_string(), "2.0+local.1");

        assert_eq!(v("1.0rc1.post2.dev4").to_string(), "1.0rc1.post2.dev4");
        assert_eq!(v("1.0-dev").to_string(), "1.0.dev0");
        assert_eq!(v("0!1.0").to_string(), "1.0");
    }

    #[test]
    fn test_parse_overflow_is_malformed() {
        assert!(ParsedVersion::parse("99999999999999999999999.0").is_err());
    }

    #[test]
    fn test_reparse_is_idempotent() {
        for raw in [
            "0",
            "0.0",
            "1.2.3",
            "v0.0.0-rc1",
            "v1.0.1-265-g5f0c7a7",
            "v0.0-7004-g1cf70ea2",
            "2.1b3",
            "10.20.30.40",
            "1!2.0.dev1",
            "1.0a2.post3.dev4+abc.5",
        ] {
            let first = v(raw);
            let second = v(&first.to_string());
            assert_eq!(first, second, "re-parse of {}", raw);
            assert_eq!(first.to_string(), second.to_string());
        }
    }

    #[test]
    fn test_ordering_pads_release() {
        assert_eq!(v("0.0"), v("0.0.0"));
        assert!(v("1.2") < v("1.2.1"));
        assert!(v("1.10") > v("1.9.9"));
    }

    #[test]
    fn test_ordering_pre_plain_post() {
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0") < v("1.0.post1"));
        assert!(v("1.0rc1") < v("1.0rc1.post2"));
        assert!(v("1.0rc1.post2") < v("1.0"));
        assert!(v("1.0a5") < v("1.0b1"));
        assert!(v("1.0.post1") < v("1.0.1rc1"));
    }

    #[test]
    fn test_ordering_dev_epoch_local() {
        assert!(v("1.0.dev1") < v("1.0a1"));
        assert!(v("1.0a1") < v("1.0"));
        assert!(v("1.0") < v("1.0.post1"));
        assert!(v("1.0a1.dev2") < v("1.0a1"));
        assert!(v("1.0.post1.dev1") < v("1.0.post1"));
        assert!(v("1.0") < v("1.0.post1.dev1"));
        assert!(v("1.0.dev1") < v("1.0.dev2"));

        assert!(v("1!0.1") > v("99.0"));
        assert!(v("0!1.0") == v("1.0"));

        assert!(v("1.0") < v("1.0+local"));
        assert!(v("1.0+local") < v("1.0.post1"));
        assert!(v("1.0+abc") < v("1.0+abc.1"));
        assert!(v("1.0+zzz") < v("1.0+1"));
        assert!(v("1.0+2") < v("1.0+10"));
    }

    #[test]
    fn test_is_baseline() {
        assert!(!v("v0.0.dev1").is_baseline());
        assert!(!v("v0.0+local").is_baseline());
        assert!(!v("1!0.0").is_baseline());
        assert!(v("v0.0").is_baseline());
        assert!(!v("v0.0.0").is_baseline());
        assert!(!v("v0.0-3-gabcdef0").is_baseline());
        assert!(!v("v0.0rc1").is_baseline());
    }

    #[test]
    fn test_to_tuple() {
        assert_eq!(
            v("1.2.3").to_tuple(),
            VersionTuple {
                release: vec![1, 2, 3],
                post: None
            }
        );
        assert_eq!(v("1.2.3").to_tuple().to_string(), "(1, 2, 3, None)");
        assert_eq!(v("v0.0").to_tuple().to_string(), "(0, 0, None)");
        assert_eq!(v("v0.0-7004-g1cf70ea2").to_tuple().to_string(), "(0, 0, 7004)");
        assert_eq!(v("v1.0.1-265-g5f0c7a7").to_tuple().to_string(), "(1, 0, 1, 265)");
        assert_eq!(v("v0.0.0-rc1").to_tuple().to_string(), "(0, 0, 0, None)");
    }

    #[test]
    fn test_to_tuple_drops_dev_epoch_and_local() {
        assert_eq!(v("1!1.2.dev3+abc").to_tuple().to_string(), "(1, 2, None)");
        assert_eq!(v("1.2.post4.dev3").to_tuple().to_string(), "(1, 2, 4)");
    }

    #[test]
    fn test_release_tuple() {
        assert_eq!(v("v1.0-5-g1234567").release_tuple(), "(1, 0)");
        assert_eq!(v("7").release_tuple(), "(7,)");
        assert_eq!(v("2.1rc1").release_tuple(), "(2, 1)");
    }

    #[test]
    fn test_compose_ignores_dev_epoch_and_local() {
        let composed = compose(&v("1.2"), &v("1!3.4.5.dev2+local"));
        assert_eq!(composed.to_string(), "3.5.post7");
    }

    #[test]
    fn test_compose_documented_example() {
        let composed = compose(&v("1.2"), &v("3.4.5"));
        assert_eq!(composed, v("3.5.post7"));
        assert_eq!(composed.release(), &[3, 5]);
        assert_eq!(composed.post(), Some(7));
        assert_eq!(composed.to_string(), "3.5.post7");
    }

    #[test]
    fn test_compose_with_post_counts() {
        let composed = compose(&v("v0.0-3-gabcdef0"), &v("v1.0.1-265-g5f0c7a7"));
        assert_eq!(composed.to_string(), "1.0.1.post268");
        assert_eq!(composed.to_tuple().to_string(), "(1, 0, 1, 268)");
    }

    #[test]
    fn test_compose_one_side_missing_post() {
        let composed = compose(&v("0.1-12"), &v("2.0.3"));
        assert_eq!(composed.to_string(), "2.0.4.post12");
    }

    #[test]
    fn test_compose_drops_pre_release() {
        let composed = compose(&v("1.0-2"), &v("0.0.0-rc1"));
        assert_eq!(composed.pre(), None);
        assert_eq!(composed.to_string(), "0.1.0.post2");
    }

    #[test]
    fn test_compose_is_commutative() {
        let samples = [
            "1.2",
            "3.4.5",
            "0.0",
            "v0.0-7004-g1cf70ea2",
            "v1.0.1-265-g5f0c7a7",
            "2.0rc1",
            "7.1.2.3-9",
        ];
        for a in samples {
            for b in samples {
                let ab = compose(&v(a), &v(b));
                let ba = compose(&v(b), &v(a));
                assert_eq!(ab, ba, "{} + {}", a, b);
                assert_eq!(ab.to_string(), ba.to_string());
            }
        }
    }
}
