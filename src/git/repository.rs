use std::collections::HashMap;
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{BranchType, IndexAddOption, Oid, Repository as Git2Repo, ResetType, Signature, Sort};

use crate::domain::DescribeFilter;
use crate::error::{MirrorError, Result};
use crate::git::{format_description, preferred_tag};

/// Username and token used for HTTPS remotes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpsCredentials {
    pub user: String,
    pub token: String,
}

/// Tagged commits considered before picking the nearest, as `git describe` does
const DESCRIBE_CANDIDATES: usize = 10;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Open the repository at exactly `path` (bare or not)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::open(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// Keep a bare mirror of `url` at `path`, creating it on first use.
    ///
    /// Every branch and tag of the remote is fetched into the same ref name
    /// locally, so branches resolve by their plain name.
    pub fn mirror<P: AsRef<Path>>(url: &str, path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = if path.exists() {
            Git2Repo::open_bare(path)?
        } else {
            let repo = Git2Repo::init_bare(path)?;
            repo.remote("origin", url)?;
            repo
        };

        {
            let mut remote = repo.find_remote("origin").map_err(|_| {
                MirrorError::config(format!("Mirror at {} has no origin", path.display()))
            })?;

            let mut fetch_options = git2::FetchOptions::new();
            fetch_options.remote_callbacks(remote_callbacks(None));

            let refspecs = ["+refs/heads/*:refs/heads/*", "+refs/tags/*:refs/tags/*"];
            remote.fetch(&refspecs, Some(&mut fetch_options), None)?;
        }

        Ok(Git2Repository { repo })
    }

    /// Clone `url` into `path`, or bring an existing checkout to
    /// `origin/<branch>` with a fetch and a hard reset.
    pub fn checkout<P: AsRef<Path>>(url: &str, path: P, branch: &str) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let mut fetch_options = git2::FetchOptions::new();
            fetch_options.remote_callbacks(remote_callbacks(None));
            let repo = RepoBuilder::new()
                .fetch_options(fetch_options)
                .branch(branch)
                .clone(url, path)?;
            return Ok(Git2Repository { repo });
        }

        let repo = Git2Repo::open(path)?;
        {
            let mut remote = repo.find_remote("origin")?;
            let mut fetch_options = git2::FetchOptions::new();
            fetch_options.remote_callbacks(remote_callbacks(None));
            let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
            remote.fetch(&[refspec.as_str()], Some(&mut fetch_options), None)?;

            let upstream = repo
                .find_reference(&format!("refs/remotes/origin/{}", branch))?
                .peel_to_commit()?;
            repo.reset(upstream.as_object(), ResetType::Hard, None)?;
        }

        Ok(Git2Repository { repo })
    }

    /// Path of the working tree, or of the git directory for bare repositories
    pub fn path(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    /// Stage everything in the working tree and commit it on HEAD.
    ///
    /// # Returns
    /// * `Ok(true)` - a commit was created
    /// * `Ok(false)` - the tree is unchanged, nothing was committed
    pub fn commit_all(&self, message: &str) -> Result<bool> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(false);
            }
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        Ok(true)
    }

    /// Push every local branch, to `url` when given or to `origin` otherwise.
    pub fn push_all(&self, url: Option<&str>, credentials: Option<&HttpsCredentials>) -> Result<()> {
        let mut remote = match url {
            Some(url) => self.repo.remote_anonymous(url)?,
            None => self
                .repo
                .find_remote("origin")
                .map_err(|_| MirrorError::config("No remote named 'origin' found"))?,
        };

        let mut refspecs = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                refspecs.push(format!("refs/heads/{0}:refs/heads/{0}", name));
            }
        }

        let mut callbacks = remote_callbacks(credentials);
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "Push rejected for {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote.push(&refspecs, Some(&mut push_options)).map_err(|e| {
            if e.class() == git2::ErrorClass::Net {
                MirrorError::Git(git2::Error::from_str(&format!(
                    "Network error during push: {}",
                    e
                )))
            } else {
                MirrorError::Git(e)
            }
        })
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(signature) => Ok(signature),
            Err(_) => Ok(Signature::now("hdl-mirror", "hdl-mirror@localhost")?),
        }
    }

    fn peel_commit(&self, reference: &str) -> Result<git2::Commit<'_>> {
        let commit = self
            .repo
            .revparse_single(reference)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| {
                MirrorError::Git(git2::Error::from_str(&format!(
                    "Cannot resolve '{}': {}",
                    reference, e
                )))
            })?;
        Ok(commit)
    }

    /// Commits reachable from `target` but not from `tag`
    fn distance(&self, target: Oid, tag: Oid) -> Result<usize> {
        let mut walk = self.repo.revwalk()?;
        walk.push(target)?;
        walk.hide(tag)?;
        Ok(walk.count())
    }

    /// Map of commit to the accepted tags pointing at it
    fn tagged_commits(&self, filter: &DescribeFilter) -> Result<HashMap<Oid, Vec<String>>> {
        let mut tagged: HashMap<Oid, Vec<String>> = HashMap::new();

        for name in super::Repository::list_tags(self)? {
            if !filter.accepts(&name) {
                continue;
            }
            let target = self
                .repo
                .find_reference(&format!("refs/tags/{}", name))
                .and_then(|reference| reference.peel_to_commit());
            // Tags on trees or blobs cannot anchor a describe
            if let Ok(commit) = target {
                tagged.entry(commit.id()).or_default().push(name);
            }
        }

        Ok(tagged)
    }
}

impl super::Repository for Git2Repository {
    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;

        Ok(tags.iter().flatten().map(|s| s.to_string()).collect())
    }

    fn create_annotated_tag(&self, name: &str, target: &str, message: &str) -> Result<()> {
        let oid = Oid::from_str(target)
            .map_err(|e| MirrorError::tag(format!("Invalid commit hash '{}': {}", target, e)))?;
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| MirrorError::tag(format!("Cannot find object: {}", e)))?;
        let signature = self.signature()?;

        self.repo
            .tag(name, &object, &signature, message, false)
            .map_err(|e| MirrorError::tag(format!("Cannot create tag '{}': {}", name, e)))?;

        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.repo
            .tag_delete(name)
            .map_err(|e| MirrorError::tag(format!("Cannot delete tag '{}': {}", name, e)))
    }

    fn resolve_commit(&self, reference: &str) -> Result<String> {
        Ok(self.peel_commit(reference)?.id().to_string())
    }

    fn describe(&self, reference: &str, filter: &DescribeFilter) -> Result<Option<String>> {
        let target = self.peel_commit(reference)?.id();
        let tagged = self.tagged_commits(filter)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(target)?;

        let mut candidates = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            if let Some(name) = tagged.get(&oid).and_then(|names| preferred_tag(names)) {
                candidates.push((oid, name.clone()));
                if candidates.len() == DESCRIBE_CANDIDATES {
                    break;
                }
            }
        }

        // Nearest candidate wins; ties keep walk order
        let mut anchor: Option<(usize, String)> = None;
        for (tag_oid, tag_name) in candidates {
            let distance = self.distance(target, tag_oid)?;
            if anchor.as_ref().map_or(true, |(best, _)| distance < *best) {
                anchor = Some((distance, tag_name));
            }
        }

        let (distance, tag_name) = match anchor {
            Some(anchor) => anchor,
            None => return Ok(None),
        };

        let short_id = self.repo.find_object(target, None)?.short_id()?;
        let short_hash = short_id.as_str().unwrap_or_default();

        Ok(Some(format_description(&tag_name, distance, short_hash)))
    }

    fn oldest_commit(&self, reference: &str) -> Result<Option<String>> {
        let head = self.peel_commit(reference)?.id();

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
        revwalk.push(head)?;

        match revwalk.next() {
            Some(oid) => Ok(Some(oid?.to_string())),
            None => Ok(None),
        }
    }

    fn commit_message(&self, reference: &str) -> Result<String> {
        let commit = self.peel_commit(reference)?;
        Ok(commit.message().unwrap_or("(empty message)").to_string())
    }
}

/// Credential callbacks for fetch and push.
///
/// HTTPS remotes use the given username/token; SSH remotes try the usual key
/// files in `~/.ssh` and then the SSH agent.
fn remote_callbacks(credentials: Option<&HttpsCredentials>) -> git2::RemoteCallbacks<'_> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(credentials) = credentials {
                return git2::Cred::userpass_plaintext(&credentials.user, &credentials.token);
            }
        }

        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            let username = username_from_url.unwrap_or("git");
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = git2::Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }

            if let Ok(cred) = git2::Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        git2::Cred::default()
    });
    callbacks
}
