use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::DescribeFilter;
use crate::error::{MirrorError, Result};
use crate::git::{format_description, preferred_tag, Repository};

/// In-memory repository with a single linear history, for testing without git
///
/// Commits are stored oldest first; a reference is either a branch name, a tag
/// name or a commit hash. Tag mutations are recorded so tests can assert on
/// the side effects of reconciliation.
pub struct MockRepository {
    commits: Vec<(String, String)>,
    branch_heads: HashMap<String, String>,
    tags: RefCell<Vec<(String, String)>>,
    created: RefCell<Vec<String>>,
    deleted: RefCell<Vec<String>>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        MockRepository {
            commits: Vec::new(),
            branch_heads: HashMap::new(),
            tags: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
        }
    }

    /// Append a commit to the history and move `master` onto it
    pub fn add_commit(&mut self, hash: impl Into<String>, message: impl Into<String>) {
        let hash = hash.into();
        self.branch_heads.insert("master".to_string(), hash.clone());
        self.commits.push((hash, message.into()));
    }

    /// Add a tag pointing to a commit
    pub fn add_tag(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.tags.get_mut().push((name.into(), hash.into()));
    }

    /// Set a branch head
    pub fn set_branch_head(&mut self, branch: impl Into<String>, hash: impl Into<String>) {
        self.branch_heads.insert(branch.into(), hash.into());
    }

    /// Tags created through the trait, in creation order
    pub fn created_tags(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    /// Tags deleted through the trait, in deletion order
    pub fn deleted_tags(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    fn position(&self, reference: &str) -> Result<usize> {
        let hash = self
            .branch_heads
            .get(reference)
            .cloned()
            .or_else(|| {
                self.tags
                    .borrow()
                    .iter()
                    .find(|(name, _)| name == reference)
                    .map(|(_, hash)| hash.clone())
            })
            .unwrap_or_else(|| reference.to_string());

        self.commits
            .iter()
            .position(|(h, _)| *h == hash)
            .ok_or_else(|| MirrorError::tag(format!("Unknown reference: {}", reference)))
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.borrow().iter().map(|(name, _)| name.clone()).collect())
    }

    fn create_annotated_tag(&self, name: &str, target: &str, _message: &str) -> Result<()> {
        if self.tags.borrow().iter().any(|(n, _)| n == name) {
            return Err(MirrorError::tag(format!("Tag already exists: {}", name)));
        }
        self.position(target)?;
        self.tags
            .borrow_mut()
            .push((name.to_string(), target.to_string()));
        self.created.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        let mut tags = self.tags.borrow_mut();
        let index = tags
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| MirrorError::tag(format!("Tag not found: {}", name)))?;
        tags.remove(index);
        self.deleted.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn resolve_commit(&self, reference: &str) -> Result<String> {
        let index = self.position(reference)?;
        Ok(self.commits[index].0.clone())
    }

    fn describe(&self, reference: &str, filter: &DescribeFilter) -> Result<Option<String>> {
        let head = self.position(reference)?;
        let tags = self.tags.borrow();

        for index in (0..=head).rev() {
            let hash = &self.commits[index].0;
            let names: Vec<String> = tags
                .iter()
                .filter(|(name, target)| target == hash && filter.accepts(name))
                .map(|(name, _)| name.clone())
                .collect();

            if let Some(name) = preferred_tag(&names) {
                let short: String = self.commits[head].0.chars().take(7).collect();
                return Ok(Some(format_description(name, head - index, &short)));
            }
        }

        Ok(None)
    }

    fn oldest_commit(&self, reference: &str) -> Result<Option<String>> {
        if self.commits.is_empty() {
            return Ok(None);
        }
        self.position(reference)?;
        Ok(self.commits.first().map(|(hash, _)| hash.clone()))
    }

    fn commit_message(&self, reference: &str) -> Result<String> {
        let index = self.position(reference)?;
        Ok(self.commits[index].1.clone())
    }
}
