use crate::domain::{MalformedTag, ParsedTag, ParsedVersion};
use crate::error::{MirrorError, Result};
use crate::git::{Repository, BASELINE_TAG, BASELINE_TAG_MESSAGE};

/// Valid tags in ascending version order plus the tags that failed to parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub valid: Vec<ParsedTag>,
    pub ignored: Vec<MalformedTag>,
}

impl Reconciliation {
    /// True when no valid tag is the `0.0` baseline
    pub fn needs_baseline(&self) -> bool {
        !self.valid.iter().any(|tag| tag.version.is_baseline())
    }
}

/// Parse and sort a list of raw tags.
///
/// Malformed tags are returned in `ignored` with their original spelling.
/// The sort is stable, so tags with equal versions keep their input order.
/// Blank entries are skipped.
///
/// # Example
/// ```
/// # use hdl_mirror::analyzer::reconcile;
/// let r = reconcile(["v1.0", "v0.0.0-rc1", "junk"]);
/// assert_eq!(r.valid[0].name, "v0.0.0-rc1");
/// assert_eq!(r.ignored[0].raw, "junk");
/// ```
pub fn reconcile<I, S>(raw_tags: I) -> Reconciliation
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut reconciliation = Reconciliation::default();

    for raw in raw_tags {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        match ParsedVersion::parse(raw) {
            Ok(version) => reconciliation.valid.push(ParsedTag::new(raw, version)),
            Err(malformed) => reconciliation.ignored.push(malformed),
        }
    }

    reconciliation
        .valid
        .sort_by(|a, b| a.version.cmp(&b.version));
    reconciliation
}

/// A valid tag together with the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    pub version: ParsedVersion,
    pub commit: String,
}

/// Valid tags of a repository, ascending by version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: Vec<TagEntry>,
}

impl TagSet {
    pub fn get(&self, name: &str) -> Option<&TagEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest version in the set
    pub fn latest(&self) -> Option<&TagEntry> {
        self.entries.last()
    }
}

/// Result of reconciling a repository's tag store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    pub tags: TagSet,
    /// Tags to purge; nothing has been deleted yet
    pub ignored: Vec<MalformedTag>,
    /// Commit the baseline tag was synthesized on, if it had to be
    pub baseline: Option<String>,
}

/// Reconciles the tags of one repository and anchors it with a baseline tag
pub struct TagReconciler<'a, R: Repository> {
    repo: &'a R,
}

impl<'a, R: Repository> TagReconciler<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        TagReconciler { repo }
    }

    /// Reconcile the tags currently in the store. Read-only.
    pub fn reconcile(&self) -> Result<Reconciliation> {
        Ok(reconcile(self.repo.list_tags()?))
    }

    /// Tag the oldest commit reachable from `branch` as `v0.0` unless a
    /// baseline already exists.
    ///
    /// # Returns
    /// * `Ok(Some(hash))` - the baseline was created on `hash`
    /// * `Ok(None)` - a baseline tag was already present
    pub fn ensure_baseline(&self, branch: &str) -> Result<Option<String>> {
        if !self.reconcile()?.needs_baseline() {
            return Ok(None);
        }

        let oldest = self.repo.oldest_commit(branch)?.ok_or_else(|| {
            MirrorError::tag(format!("Branch '{}' has no commits to anchor {}", branch, BASELINE_TAG))
        })?;
        self.repo
            .create_annotated_tag(BASELINE_TAG, &oldest, BASELINE_TAG_MESSAGE)?;

        Ok(Some(oldest))
    }

    /// Resolve every valid tag to its commit
    pub fn tag_set(&self, reconciliation: &Reconciliation) -> Result<TagSet> {
        let entries = reconciliation
            .valid
            .iter()
            .map(|tag| {
                Ok(TagEntry {
                    name: tag.name.clone(),
                    version: tag.version.clone(),
                    commit: self.repo.resolve_commit(&tag.name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TagSet { entries })
    }

    /// Synthesize the baseline when missing, then reconcile again so the
    /// result includes it. Malformed tags are reported, not deleted.
    pub fn run(&self, branch: &str) -> Result<TagReport> {
        let baseline = self.ensure_baseline(branch)?;
        let reconciliation = self.reconcile()?;
        let tags = self.tag_set(&reconciliation)?;

        Ok(TagReport {
            tags,
            ignored: reconciliation.ignored,
            baseline,
        })
    }

    /// Delete the given malformed tags from the store, each at most once.
    ///
    /// # Returns
    /// The names that were deleted, in order
    pub fn purge(&self, ignored: &[MalformedTag]) -> Result<Vec<String>> {
        let mut deleted: Vec<String> = Vec::new();
        for tag in ignored {
            if deleted.contains(&tag.raw) {
                continue;
            }
            self.repo.delete_tag(&tag.raw)?;
            deleted.push(tag.raw.clone());
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn names(reconciliation: &Reconciliation) -> Vec<&str> {
        reconciliation
            .valid
            .iter()
            .map(|tag| tag.name.as_str())
            .collect()
    }

    fn history() -> MockRepository {
        let mut repo = MockRepository::new();
        repo.add_commit("aaaaaaa0001", "Initial import");
        repo.add_commit("bbbbbbb0002", "Add ALU");
        repo.add_commit("ccccccc0003", "Fix decoder");
        repo
    }

    #[test]
    fn test_reconcile_sorts_describe_tags() {
        let r = reconcile([
            "v0.0",
            "v0.0.0",
            "v0.0.0-rc1",
            "v1.0.1-265-g5f0c7a7",
            "v0.0-7004-g1cf70ea2",
        ]);
        assert_eq!(
            names(&r),
            vec![
                "v0.0.0-rc1",
                "v0.0",
                "v0.0.0",
                "v0.0-7004-g1cf70ea2",
                "v1.0.1-265-g5f0c7a7",
            ]
        );
        let versions: Vec<String> = r.valid.iter().map(|t| t.version.to_string()).collect();
        assert_eq!(
            versions,
            vec!["0.0.0rc1", "0.0", "0.0.0", "0.0.post7004", "1.0.1.post265"]
        );
        assert!(r.ignored.is_empty());
    }

    #[test]
    fn test_reconcile_without_v_prefix() {
        let r = reconcile(["0.0", "0.0.0", "0.0.0-rc1", "1.0.1-265-g5f0c7a7", "0.0-7004-g1cf70ea2"]);
        assert_eq!(
            names(&r),
            vec!["0.0.0-rc1", "0.0", "0.0.0", "0.0-7004-g1cf70ea2", "1.0.1-265-g5f0c7a7"]
        );
    }

    #[test]
    fn test_reconcile_equal_versions_keep_input_order() {
        let r = reconcile(["v0.0.0", "v0.0", "0.0"]);
        assert_eq!(names(&r), vec!["v0.0.0", "v0.0", "0.0"]);
    }

    #[test]
    fn test_reconcile_routes_malformed() {
        let r = reconcile(["v1.0", "not-a-version", "", "nightly-2020"]);
        assert_eq!(names(&r), vec!["v1.0"]);
        let ignored: Vec<&str> = r.ignored.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(ignored, vec!["not-a-version", "nightly-2020"]);
    }

    #[test]
    fn test_reconcile_keeps_dev_local_and_epoch_tags() {
        let r = reconcile(["v1.0.dev3", "v2.0+local.1", "1!2.0", "v0.0"]);
        assert!(r.ignored.is_empty());
        assert_eq!(names(&r), vec!["v0.0", "v1.0.dev3", "v2.0+local.1", "1!2.0"]);
        assert!(!r.needs_baseline());
    }

    #[test]
    fn test_purge_leaves_dev_local_and_epoch_tags() {
        let mut repo = history();
        repo.add_tag("v1.0.dev3", "bbbbbbb0002");
        repo.add_tag("v2.0+local.1", "ccccccc0003");
        repo.add_tag("1!2.0", "ccccccc0003");
        let reconciler = TagReconciler::new(&repo);

        let report = reconciler.run("master").unwrap();
        assert!(report.ignored.is_empty());
        assert!(reconciler.purge(&report.ignored).unwrap().is_empty());
        assert!(repo.deleted_tags().is_empty());
        assert_eq!(report.tags.latest().unwrap().name, "1!2.0");
    }

    #[test]
    fn test_needs_baseline() {
        assert!(reconcile(Vec::<String>::new()).needs_baseline());
        assert!(reconcile(["v0.0.0", "v1.0"]).needs_baseline());
        assert!(!reconcile(["v1.0", "0.0"]).needs_baseline());
    }

    #[test]
    fn test_run_synthesizes_baseline_once() {
        let repo = history();
        let reconciler = TagReconciler::new(&repo);

        let first = reconciler.run("master").unwrap();
        assert_eq!(first.baseline, Some("aaaaaaa0001".to_string()));
        assert_eq!(first.tags.names(), vec!["v0.0"]);
        assert_eq!(first.tags.get("v0.0").unwrap().commit, "aaaaaaa0001");

        let second = reconciler.run("master").unwrap();
        assert_eq!(second.baseline, None);
        assert!(second.tags.contains("v0.0"));
        assert_eq!(repo.created_tags(), vec!["v0.0".to_string()]);
    }

    #[test]
    fn test_run_keeps_existing_baseline() {
        let mut repo = history();
        repo.add_tag("0.0", "bbbbbbb0002");
        repo.add_tag("v1.0", "ccccccc0003");

        let report = TagReconciler::new(&repo).run("master").unwrap();
        assert_eq!(report.baseline, None);
        assert_eq!(report.tags.names(), vec!["0.0", "v1.0"]);
        assert_eq!(report.tags.latest().unwrap().commit, "ccccccc0003");
        assert!(repo.created_tags().is_empty());
    }

    #[test]
    fn test_run_reports_but_does_not_delete() {
        let mut repo = history();
        repo.add_tag("not-a-version", "bbbbbbb0002");

        let report = TagReconciler::new(&repo).run("master").unwrap();
        assert_eq!(report.ignored.len(), 1);
        assert!(repo.deleted_tags().is_empty());
        assert!(repo.list_tags().unwrap().contains(&"not-a-version".to_string()));
    }

    #[test]
    fn test_purge_deletes_each_tag_once() {
        let mut repo = history();
        repo.add_tag("not-a-version", "bbbbbbb0002");
        let reconciler = TagReconciler::new(&repo);

        let report = reconciler.run("master").unwrap();
        let mut ignored = report.ignored.clone();
        ignored.extend(report.ignored.clone());

        let deleted = reconciler.purge(&ignored).unwrap();
        assert_eq!(deleted, vec!["not-a-version".to_string()]);
        assert_eq!(repo.deleted_tags(), vec!["not-a-version".to_string()]);
        assert!(reconciler.reconcile().unwrap().ignored.is_empty());
    }

    #[test]
    fn test_ensure_baseline_on_empty_history_fails() {
        let repo = MockRepository::new();
        let err = TagReconciler::new(&repo).ensure_baseline("master");
        assert!(err.is_err());
    }
}
