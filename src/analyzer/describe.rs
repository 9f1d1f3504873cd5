use crate::analyzer::reconciler::reconcile;
use crate::domain::{DescribeFilter, ParsedVersion};
use crate::error::{MirrorError, Result};
use crate::git::Repository;

/// A describe string and the version it implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Describe {
    /// Description as reported, e.g. `v1.0.1-265-g5f0c7a7`
    pub description: String,
    pub version: ParsedVersion,
}

/// Parse a `TAG-DISTANCE-gHASH` description into a version whose post
/// counter is the distance.
pub fn parse_description(description: &str) -> Result<ParsedVersion> {
    let trimmed = description.trim();
    let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let mut parts = unprefixed.rsplitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(hash), Some(distance), Some(tag)) if hash.starts_with('g') => {
            Ok(ParsedVersion::parse(&format!("{}-{}", tag, distance))?)
        }
        _ => Err(MirrorError::malformed(
            description,
            "expected a TAG-DISTANCE-gHASH description",
        )),
    }
}

/// Version of `reference` relative to its nearest release tag.
///
/// # Returns
/// * `Err(MirrorError::DescribeUnavailable)` - no release tag is reachable;
///   the caller must synthesize a baseline first, retrying cannot help
pub fn describe<R: Repository>(repo: &R, reference: &str) -> Result<Describe> {
    describe_with(repo, reference, &DescribeFilter::release_tags())
}

pub fn describe_with<R: Repository>(
    repo: &R,
    reference: &str,
    filter: &DescribeFilter,
) -> Result<Describe> {
    let description =
        repo.describe(reference, filter)?
            .ok_or_else(|| MirrorError::DescribeUnavailable {
                reference: reference.to_string(),
            })?;
    let version = parse_description(&description)?;

    Ok(Describe {
        description,
        version,
    })
}

/// Version of a hand-provided description (one tag or describe string per line).
///
/// Exactly one line must parse; anything else is ambiguous and nothing is guessed.
pub fn resolve_literal(description: &str) -> Result<ParsedVersion> {
    let reconciliation = reconcile(description.lines());
    let found = reconciliation.valid.len();

    match reconciliation.valid.into_iter().next() {
        Some(tag) if found == 1 => Ok(tag.version),
        _ => Err(MirrorError::AmbiguousDescribe {
            description: description.to_string(),
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    #[test]
    fn test_parse_description() {
        let version = parse_description("v1.0.1-265-g5f0c7a7").unwrap();
        assert_eq!(version.to_string(), "1.0.1.post265");

        let version = parse_description("0.0-7004-g1cf70ea2").unwrap();
        assert_eq!(version.to_string(), "0.0.post7004");
    }

    #[test]
    fn test_parse_description_zero_distance() {
        let version = parse_description("v2.1-0-gdeadbee\n").unwrap();
        assert_eq!(version.release(), &[2, 1]);
        assert_eq!(version.post(), Some(0));
    }

    #[test]
    fn test_parse_description_rejects_plain_tags() {
        assert!(parse_description("v1.0").is_err());
        assert!(parse_description("v1.0-5").is_err());
        assert!(parse_description("v1.0-five-gabc").is_err());
    }

    #[test]
    fn test_describe_through_repository() {
        let mut repo = MockRepository::new();
        repo.add_commit("1cf70ea2aaaa", "first");
        repo.add_commit("5f0c7a7bbbbb", "second");
        repo.add_tag("v0.0", "1cf70ea2aaaa");

        let described = describe(&repo, "master").unwrap();
        assert_eq!(described.description, "v0.0-1-g5f0c7a7");
        assert_eq!(described.version.to_string(), "0.0.post1");
    }

    #[test]
    fn test_describe_ignores_release_candidates() {
        let mut repo = MockRepository::new();
        repo.add_commit("1111111aaaa", "first");
        repo.add_commit("2222222bbbb", "second");
        repo.add_tag("v0.0", "1111111aaaa");
        repo.add_tag("v1.0-rc1", "2222222bbbb");

        let described = describe(&repo, "master").unwrap();
        assert_eq!(described.description, "v0.0-1-g2222222");
    }

    #[test]
    fn test_describe_unavailable() {
        let mut repo = MockRepository::new();
        repo.add_commit("1111111aaaa", "first");
        repo.add_tag("nightly", "1111111aaaa");

        match describe(&repo, "master") {
            Err(MirrorError::DescribeUnavailable { reference }) => assert_eq!(reference, "master"),
            other => panic!("expected DescribeUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_literal_single() {
        let version = resolve_literal("v1.0-5-g1234567").unwrap();
        assert_eq!(version.to_string(), "1.0.post5");
    }

    #[test]
    fn test_resolve_literal_ambiguous() {
        match resolve_literal("v1.0-5-g1234567\nv2.0") {
            Err(MirrorError::AmbiguousDescribe { found, .. }) => assert_eq!(found, 2),
            other => panic!("expected AmbiguousDescribe, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_literal_nothing_parses() {
        match resolve_literal("garbage") {
            Err(MirrorError::AmbiguousDescribe { found, .. }) => assert_eq!(found, 0),
            other => panic!("expected AmbiguousDescribe, got {:?}", other),
        }
    }
}
