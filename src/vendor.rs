//! Vendoring upstream data into an output checkout
//!
//! The data directory is either merged in with `git subtree` from the local
//! mirror, or tracked as a `git submodule` of the upstream URL. Both run the
//! git command line, which has subtree support where libgit2 does not.

use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use crate::error::{MirrorError, Result};

const FALLBACK_NAME: &str = "hdl-mirror";
const FALLBACK_EMAIL: &str = "hdl-mirror@localhost";

/// Rebase the entries of a vendored `.gitmodules` onto the directory it was
/// vendored into, so the file is valid at the repository root.
///
/// # Example
/// ```
/// # use hdl_mirror::vendor::prefix_gitmodules;
/// let text = "[submodule \"third_party/fpu\"]\n\tpath = third_party/fpu\n";
/// assert_eq!(
///     prefix_gitmodules(text, "pythondata_cpu_x/verilog"),
///     "[submodule \"pythondata_cpu_x/verilog/third_party/fpu\"]\n\tpath = pythondata_cpu_x/verilog/third_party/fpu\n"
/// );
/// ```
pub fn prefix_gitmodules(text: &str, dir: &str) -> String {
    let dir = dir.trim_end_matches('/');
    text.replace("[submodule \"", &format!("[submodule \"{}/", dir))
        .replace("path = ", &format!("path = {}/", dir))
}

/// Runs vendoring commands inside one output checkout.
pub struct Vendor<'a> {
    repo_dir: &'a Path,
    footer: String,
    fallback_identity: bool,
}

impl<'a> Vendor<'a> {
    /// `footer` ends every commit message written here.
    pub fn new(repo_dir: &'a Path, footer: impl Into<String>) -> Self {
        let configured = Command::new("git")
            .args(["config", "user.email"])
            .current_dir(repo_dir)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);

        Vendor {
            repo_dir,
            footer: footer.into(),
            fallback_identity: !configured,
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(self.repo_dir)
            .env("GIT_MERGE_AUTOEDIT", "no")
            .env("GIT_TERMINAL_PROMPT", "0");
        if self.fallback_identity {
            cmd.env("GIT_AUTHOR_NAME", FALLBACK_NAME)
                .env("GIT_AUTHOR_EMAIL", FALLBACK_EMAIL)
                .env("GIT_COMMITTER_NAME", FALLBACK_NAME)
                .env("GIT_COMMITTER_EMAIL", FALLBACK_EMAIL);
        }

        let output = cmd.output().map_err(|e| {
            MirrorError::vendor(format!("Failed to run git {}: {}", args.join(" "), e))
        })?;

        if !output.status.success() {
            return Err(MirrorError::vendor(format!(
                "git {} failed with exit code {}\nStdout: {}\nStderr: {}",
                args.join(" "),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout).trim_end(),
                String::from_utf8_lossy(&output.stderr).trim_end()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn head(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn commit(&self, headline: &str) -> Result<()> {
        let message = format!("{}\n\n{}\n", headline, self.footer);
        self.git(&["commit", "-q", "-m", &message])?;
        Ok(())
    }

    /// Merge commit `hash` of `source` into `dir`, adding the subtree the
    /// first time. Returns true when anything was committed.
    pub fn subtree(&self, dir: &str, source: &Path, hash: &str) -> Result<bool> {
        let before = self.head()?;
        let action = if self.repo_dir.join(dir).exists() {
            "pull"
        } else {
            "add"
        };
        // Stat data written by libgit2 can look dirty to the clean-tree check
        let _ = self.git(&["update-index", "-q", "--refresh"]);
        let source = source.to_string_lossy();
        self.git(&["subtree", action, "-P", dir, source.as_ref(), hash])?;

        let synced = self.sync_gitmodules(dir)?;
        Ok(synced || self.head()? != before)
    }

    /// Copy the vendored `.gitmodules` of `dir` to the repository root with
    /// prefixed paths, committing when it changed.
    pub fn sync_gitmodules(&self, dir: &str) -> Result<bool> {
        let vendored = self.repo_dir.join(dir).join(".gitmodules");
        if !vendored.exists() {
            return Ok(false);
        }
        let wanted = prefix_gitmodules(&fs::read_to_string(&vendored)?, dir);

        let target = self.repo_dir.join(".gitmodules");
        let current = match fs::read_to_string(&target) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if wanted == current {
            return Ok(false);
        }

        fs::write(&target, &wanted)?;
        self.git(&["add", ".gitmodules"])?;
        self.commit("Updating .gitmodules file.")?;
        Ok(true)
    }

    /// Point the `dir` submodule at `hash` of `url`, adding it the first time.
    /// Returns true when the bump was committed.
    pub fn submodule(&self, dir: &str, url: &str, hash: &str) -> Result<bool> {
        if self.repo_dir.join(dir).exists() {
            self.git(&["submodule", "update", "--init", "--remote", "--merge", "--", dir])?;
        } else {
            self.git(&["submodule", "add", url, dir])?;
        }
        self.git(&["-C", dir, "checkout", "-q", hash])?;

        if self.git(&["status", "--porcelain"])?.trim().is_empty() {
            return Ok(false);
        }
        self.git(&["add", "-A"])?;
        self.commit(&format!("Bump {} submodule to {}", dir, hash))?;
        Ok(true)
    }

    /// Check out every submodule recorded in the checkout, recursively
    pub fn init_submodules(&self) -> Result<()> {
        self.git(&["submodule", "update", "--init", "--recursive"])?;
        Ok(())
    }
}
