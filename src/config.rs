use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};

/// File name looked up in the current directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "modules.toml";

/// Represents the complete configuration for hdl-mirror.
///
/// Contains the run-wide settings and the module declarations, in the order
/// they appear in the file.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

fn default_organization() -> String {
    "litex-hub".to_string()
}

fn default_git_mode() -> String {
    "git+ssh".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_tool_url() -> String {
    "https://github.com/litex-hub/litex-data-auto".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

/// Run-wide settings shared by every module.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Hosting organization owning the generated repositories
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Scheme used for output repository URLs (`git+ssh`, `https`, ...)
    #[serde(default = "default_git_mode")]
    pub git_mode: String,

    /// Directory holding `srcs/` mirrors and `repos/` checkouts
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Where the tool itself is published; quoted in commit messages
    #[serde(default = "default_tool_url")]
    pub tool_url: String,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub user: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            organization: default_organization(),
            git_mode: default_git_mode(),
            work_dir: default_work_dir(),
            template_dir: default_template_dir(),
            tool_url: default_tool_url(),
            token: None,
            user: None,
        }
    }
}

impl Settings {
    /// URL used to clone and push the output repository
    pub fn repo_url(&self, repo: &str) -> String {
        format!(
            "{}://github.com/{}/{}.git",
            self.git_mode, self.organization, repo
        )
    }

    pub fn repo_https(&self, repo: &str) -> String {
        format!("https://github.com/{}/{}.git", self.organization, repo)
    }

    /// `organization/repo`
    pub fn slug(&self, repo: &str) -> String {
        format!("{}/{}", self.organization, repo)
    }

    /// Bare mirror of a module's upstream source
    pub fn source_dir(&self, repo: &str) -> PathBuf {
        self.work_dir.join("srcs").join(repo)
    }

    /// Checkout of a module's output repository
    pub fn output_dir(&self, repo: &str) -> PathBuf {
        self.work_dir.join("repos").join(repo)
    }

    /// Apply `GH_TOKEN`, `GH_USER` and `GIT_MODE` from the environment
    pub fn apply_env(&mut self) {
        if let Some(token) = non_empty_var("GH_TOKEN") {
            self.token = Some(token);
        }
        if let Some(user) = non_empty_var("GH_USER") {
            self.user = Some(user);
        }
        if let Some(mode) = non_empty_var("GIT_MODE") {
            self.git_mode = mode;
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// One `[[module]]` declaration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModuleConfig {
    pub name: String,

    /// Module category, e.g. `cpu` or `misc`
    #[serde(rename = "type")]
    pub kind: String,

    /// What the data directory holds, e.g. `verilog` or `system_verilog`
    pub contents: String,

    pub license_spdx: String,

    /// Upstream repository URL
    #[serde(default)]
    pub src: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Homepage override for generated repositories
    #[serde(default)]
    pub gen_src: Option<String>,

    #[serde(default)]
    pub git_describe: Option<String>,

    #[serde(default)]
    pub git_hash: Option<String>,

    /// Vendor upstream data as a git submodule instead of a subtree
    #[serde(default)]
    pub submodule: bool,

    /// Any other keys, passed through to templates as strings
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// Where a module's data version comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// Mirror and describe an upstream repository branch
    FromUpstreamRepo { url: String, branch: String },
    /// A hand-provided describe string and commit hash
    FromLiteralDescribe { description: String, hash: String },
}

impl ModuleConfig {
    /// `pythondata-<type>-<name>`
    pub fn repo_name(&self) -> String {
        format!("pythondata-{}-{}", self.kind, self.name)
    }

    /// `pythondata_<type>_<name>`
    pub fn python_module(&self) -> String {
        format!("pythondata_{}_{}", self.kind, self.name)
    }

    /// Data directory inside the output repository
    pub fn data_dir(&self) -> String {
        format!("{}/{}", self.python_module(), self.contents)
    }

    /// Resolve the declaration into its source variant.
    ///
    /// An upstream `src` wins over a literal describe.
    pub fn source(&self) -> Result<ModuleSource> {
        if let Some(url) = &self.src {
            return Ok(ModuleSource::FromUpstreamRepo {
                url: url.clone(),
                branch: self.branch.clone(),
            });
        }

        match (&self.git_describe, &self.git_hash) {
            (Some(description), Some(hash)) => Ok(ModuleSource::FromLiteralDescribe {
                description: description.clone(),
                hash: hash.clone(),
            }),
            _ => Err(MirrorError::config(format!(
                "Module '{}' needs either `src` or both `git_describe` and `git_hash`",
                self.name
            ))),
        }
    }

    /// Extra keys rendered as template strings
    pub fn extra_values(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

impl Config {
    /// Modules to process: all of them, or only those named in `selected`,
    /// always in declaration order.
    pub fn selected_modules<'a>(&'a self, selected: &[String]) -> Vec<&'a ModuleConfig> {
        self.modules
            .iter()
            .filter(|module| selected.is_empty() || selected.contains(&module.name))
            .collect()
    }

    /// Reject duplicate module names.
    ///
    /// A module without a usable source is not an error here; it fails on
    /// its own when processed so the other modules still run.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(MirrorError::config(format!(
                    "Module '{}' is declared more than once",
                    module.name
                )));
            }
        }
        Ok(())
    }
}

/// Parse a configuration from TOML text without touching the environment
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(text).map_err(|e| MirrorError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Locate the configuration file.
///
/// Lookup order:
/// 1. Custom path provided as parameter
/// 2. `modules.toml` in current directory
/// 3. `hdl-mirror/modules.toml` in user config directory
pub fn find_config(config_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(PathBuf::from(path));
    }

    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("hdl-mirror").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Loads configuration from file and applies environment overrides.
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Config)` - Loaded configuration
/// * `Err` - If no file is found, or it cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = find_config(config_path)
        .ok_or_else(|| MirrorError::config(format!("No {} found", CONFIG_FILE_NAME)))?;

    let text = fs::read_to_string(&path).map_err(|e| {
        MirrorError::config(format!("Cannot read {}: {}", path.display(), e))
    })?;

    let mut config = parse_config(&text)?;
    config.settings.apply_env();
    Ok(config)
}
