//! Remote hosting collaborator.
//!
//! Generated repositories live under one organization on the hosting
//! service. Before a module is generated its repository settings are brought
//! in line with the module description; a module whose repository does not
//! exist is skipped.

use serde::Serialize;

use crate::error::{MirrorError, Result};

pub const GITHUB_API: &str = "https://api.github.com";

/// Settings applied to every generated repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSettings {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub has_issues: bool,
    pub has_wiki: bool,
    pub has_downloads: bool,
    pub has_projects: bool,
}

impl RepoSettings {
    /// Derive settings from a module's name, type and contents.
    ///
    /// The homepage is the upstream source, overridden by `gen_src` when set.
    pub fn for_module(
        name: &str,
        kind: &str,
        contents: &str,
        src: Option<&str>,
        gen_src: Option<&str>,
    ) -> Self {
        RepoSettings {
            description: format!(
                "Python module containing {} files for {} {} (for use with LiteX).",
                contents, name, kind
            ),
            homepage: gen_src.or(src).map(str::to_string),
            has_issues: false,
            has_wiki: false,
            has_downloads: false,
            has_projects: false,
        }
    }
}

/// Hosting service operations used by the pipeline
pub trait HostingClient {
    /// Apply `settings` to the repository `slug` (`organization/repo`).
    ///
    /// # Returns
    /// * `Ok(true)` - the repository exists (settings updated when permitted)
    /// * `Ok(false)` - the repository does not exist
    fn update_settings(&self, slug: &str, settings: &RepoSettings) -> Result<bool>;

    /// Whether write operations are possible
    fn can_write(&self) -> bool;
}

/// GitHub REST API client.
///
/// Without a token only repository existence is checked.
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base(GITHUB_API, token)
    }

    pub fn with_base(api_base: impl Into<String>, token: Option<String>) -> Self {
        GitHubClient {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn repo_url(&self, slug: &str) -> String {
        format!("{}/repos/{}", self.api_base, slug)
    }
}

impl HostingClient for GitHubClient {
    fn update_settings(&self, slug: &str, settings: &RepoSettings) -> Result<bool> {
        let url = self.repo_url(slug);
        let user_agent = concat!("hdl-mirror/", env!("CARGO_PKG_VERSION"));

        let response = match &self.token {
            Some(token) => self
                .agent
                .patch(&url)
                .header("Authorization", &format!("Bearer {}", token))
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", user_agent)
                .send_json(settings),
            None => self
                .agent
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", user_agent)
                .call(),
        };

        match response {
            Ok(_) => Ok(true),
            Err(ureq::Error::StatusCode(404)) => Ok(false),
            Err(e) => Err(classify_http_error(e, slug)),
        }
    }

    fn can_write(&self) -> bool {
        self.token.is_some()
    }
}

fn classify_http_error(err: ureq::Error, slug: &str) -> MirrorError {
    match err {
        ureq::Error::StatusCode(401) => {
            MirrorError::hosting(format!("401 Unauthorized for '{}', check GH_TOKEN", slug))
        }
        ureq::Error::StatusCode(403) => {
            MirrorError::hosting(format!("403 Forbidden for '{}', insufficient permissions", slug))
        }
        ureq::Error::StatusCode(status) if (500..=599).contains(&status) => {
            MirrorError::hosting(format!("server error ({}) for '{}'", status, slug))
        }
        other => MirrorError::hosting(format!("request for '{}' failed: {}", slug, other)),
    }
}
