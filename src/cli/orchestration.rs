//! Main workflow orchestration logic
//!
//! Resolves the tool version once, then runs every selected module through
//! the same pipeline: resolve the data version, compose the module version,
//! update the hosting settings, render the templates into the output
//! checkout, commit and vendor the upstream data. Pushing happens in a second pass once every module
//! has been generated. A failing module is recorded and the run continues.

use std::fs;
use std::path::PathBuf;

use crate::analyzer::{describe, resolve_literal, Describe, TagReconciler, TagSet};
use crate::boundary::ReconcileWarning;
use crate::config::{Config, ModuleConfig, ModuleSource, Settings};
use crate::domain::{compose, ParsedVersion};
use crate::error::{MirrorError, Result};
use crate::git::{Git2Repository, HttpsCredentials, Repository, BASELINE_TAG};
use crate::hosting::{GitHubClient, HostingClient, RepoSettings};
use crate::license::{LicenseCache, LicenseSource, SpdxSource};
use crate::render::{ModuleData, TemplateRenderer};
use crate::ui;
use crate::vendor::Vendor;

/// Branch of the generated repositories that receives updates
pub const OUTPUT_BRANCH: &str = "master";

/// Arguments for the mirror workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorWorkflowArgs {
    /// Only process these modules; all when empty
    pub modules: Vec<String>,

    /// Push generated repositories after all modules are updated
    pub push: bool,

    /// Resolve and print versions without touching any output repository
    pub dry_run: bool,

    /// Repository whose describe gives the tool version
    pub tool_repo: PathBuf,
}

/// Data version of a module and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedData {
    pub description: String,
    pub hash: String,
    pub version: ParsedVersion,
    /// Python tuple for `data_version_tuple`: the full tuple for upstream
    /// describes, the release alone for literal ones
    pub version_tuple: String,
    /// Upstream commit message; absent for literal describes
    pub message: Option<String>,
    /// Valid upstream tags after reconciliation
    pub tags: Option<TagSet>,
    pub warnings: Vec<ReconcileWarning>,
    /// Local mirror the data is vendored from; absent for literal describes
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Output generated; `committed` is false when nothing changed
    Updated { version: String, committed: bool },
    /// Versions resolved only (dry run)
    Resolved { version: String },
    Skipped { reason: String },
    Failed { error: String },
}

/// Result of running one module through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub name: String,
    pub status: ModuleStatus,
    pub pushed: bool,
}

impl ModuleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ModuleStatus::Failed { .. })
    }
}

/// Reconcile the upstream tags, purge the malformed ones and describe `branch`.
pub fn resolve_upstream<R: Repository>(repo: &R, branch: &str) -> Result<ResolvedData> {
    let reconciler = TagReconciler::new(repo);
    let report = reconciler.run(branch)?;
    let warnings = ReconcileWarning::from_report(&report, BASELINE_TAG);
    reconciler.purge(&report.ignored)?;

    let hash = repo.resolve_commit(branch)?;
    let message = repo.commit_message(&hash)?;
    let described = describe(repo, branch)?;

    Ok(ResolvedData {
        description: described.description,
        hash,
        version_tuple: described.version.to_tuple().to_string(),
        version: described.version,
        message: Some(message),
        tags: Some(report.tags),
        warnings,
        source_path: None,
    })
}

/// Data version from a hand-provided describe string
pub fn resolve_literal_source(description: &str, hash: &str) -> Result<ResolvedData> {
    let version = resolve_literal(description)?;
    Ok(ResolvedData {
        description: description.to_string(),
        hash: hash.to_string(),
        version_tuple: version.release_tuple(),
        version,
        message: None,
        tags: None,
        warnings: Vec::new(),
        source_path: None,
    })
}

/// Everything the templates see for one module, in a stable key order
pub fn build_module_data(
    module: &ModuleConfig,
    settings: &Settings,
    tool: &Describe,
    data: &ResolvedData,
) -> ModuleData {
    let repo = module.repo_name();
    let version = compose(&tool.version, &data.version);

    let mut out = ModuleData::new();
    out.insert("name", module.name.as_str());
    out.insert("type", module.kind.as_str());
    out.insert("contents", module.contents.as_str());
    out.insert("repo", repo.as_str());
    out.insert("repo_url", settings.repo_url(&repo));
    out.insert("repo_https", settings.repo_https(&repo));
    out.insert("py", module.python_module());
    out.insert("dir", module.data_dir());
    out.insert("license_spdx", module.license_spdx.as_str());
    out.insert("tool_version", tool.version.to_string());
    out.insert("tool_version_tuple", tool.version.to_tuple().to_string());
    out.insert("data_version", data.version.to_string());
    out.insert("data_version_tuple", data.version_tuple.as_str());
    out.insert("data_git_describe", data.description.as_str());
    out.insert("data_git_hash", data.hash.as_str());
    if let Some(message) = &data.message {
        out.insert("data_git_msg", message.as_str());
    }
    out.insert("version", version.to_string());
    out.insert("version_tuple", version.to_tuple().to_string());
    if let Some(src) = &module.src {
        out.insert("src", src.as_str());
        out.insert("branch", module.branch.as_str());
    }
    if let Some(gen_src) = &module.gen_src {
        out.insert("gen_src", gen_src.as_str());
    }
    for (key, value) in module.extra_values() {
        if !out.contains(&key) {
            out.insert(key, value);
        }
    }
    out
}

/// Commit message for an output repository update.
///
/// Upstream modules quote the upstream commit message, one `> ` per line.
pub fn commit_message(data: &ModuleData, tool_url: &str) -> String {
    let get = |key: &str| data.get(key).unwrap_or_default();
    let mut message = format!("Updating {} to {}\n\n", get("repo"), get("version"));

    if let (Some(upstream), Some(src)) = (data.get("data_git_msg"), data.get("src")) {
        message.push_str(&format!(
            "Updated data to {} based on {} from {}.\n",
            get("data_git_describe"),
            get("data_git_hash"),
            src
        ));
        for line in upstream.lines() {
            if line.is_empty() {
                message.push_str(">\n");
            } else {
                message.push_str(&format!("> {}\n", line));
            }
        }
        message.push('\n');
    }

    message.push_str(&updated_using(data, tool_url));
    message.push('\n');
    message
}

/// Last line of every commit the tool writes
pub fn updated_using(data: &ModuleData, tool_url: &str) -> String {
    format!(
        "Updated using {} from {}",
        data.get("tool_version").unwrap_or_default(),
        tool_url
    )
}

/// Runs modules through the pipeline with a fixed tool version
pub struct Pipeline<'a, H: HostingClient, S: LicenseSource> {
    settings: &'a Settings,
    tool: &'a Describe,
    hosting: &'a H,
    licenses: &'a LicenseCache<S>,
    renderer: TemplateRenderer<'a>,
    dry_run: bool,
}

impl<'a, H: HostingClient, S: LicenseSource> Pipeline<'a, H, S> {
    pub fn new(
        settings: &'a Settings,
        tool: &'a Describe,
        hosting: &'a H,
        licenses: &'a LicenseCache<S>,
        dry_run: bool,
    ) -> Self {
        Pipeline {
            settings,
            tool,
            hosting,
            licenses,
            renderer: TemplateRenderer::new(&settings.template_dir),
            dry_run,
        }
    }

    /// Resolve a module's data version from its declared source
    pub fn resolve(&self, module: &ModuleConfig) -> Result<ResolvedData> {
        match module.source()? {
            ModuleSource::FromUpstreamRepo { url, branch } => {
                let mirror =
                    Git2Repository::mirror(&url, self.settings.source_dir(&module.repo_name()))?;
                let mut resolved = resolve_upstream(&mirror, &branch)?;
                resolved.source_path = Some(fs::canonicalize(mirror.path())?);
                Ok(resolved)
            }
            ModuleSource::FromLiteralDescribe { description, hash } => {
                resolve_literal_source(&description, &hash)
            }
        }
    }

    /// Run one module. Errors are returned, not printed.
    pub fn process(&self, module: &ModuleConfig) -> Result<ModuleStatus> {
        let resolved = self.resolve(module)?;
        if let Some(tags) = &resolved.tags {
            ui::display_tag_set(tags);
        }
        for warning in &resolved.warnings {
            ui::display_warning(warning);
        }

        let data = build_module_data(module, self.settings, self.tool, &resolved);
        ui::display_module_data(&module.name, &data);
        for line in ui::format_versions(
            &module.name,
            (data.get("version").unwrap_or_default(), data.get("version_tuple").unwrap_or_default()),
            (data.get("tool_version").unwrap_or_default(), data.get("tool_version_tuple").unwrap_or_default()),
            (data.get("data_version").unwrap_or_default(), data.get("data_version_tuple").unwrap_or_default()),
        ) {
            println!("{}", line);
        }

        let version = data.get("version").unwrap_or_default().to_string();
        if self.dry_run {
            return Ok(ModuleStatus::Resolved { version });
        }

        let repo = module.repo_name();
        let slug = self.settings.slug(&repo);
        let repo_settings = RepoSettings::for_module(
            &module.name,
            &module.kind,
            &module.contents,
            module.src.as_deref(),
            module.gen_src.as_deref(),
        );
        if !self.hosting.update_settings(&slug, &repo_settings)? {
            let warning = ReconcileWarning::MissingHostingRepo { slug };
            ui::display_warning(&warning);
            return Ok(ModuleStatus::Skipped {
                reason: warning.to_string(),
            });
        }

        let output = Git2Repository::checkout(
            &self.settings.repo_url(&repo),
            self.settings.output_dir(&repo),
            OUTPUT_BRANCH,
        )?;

        let vendor = Vendor::new(output.path(), updated_using(&data, &self.settings.tool_url));
        if module.submodule {
            vendor.init_submodules()?;
        }

        ui::display_status(&format!("Updating: {}", repo));
        ui::display_rule();
        let actions = self.renderer.render_tree(&data, output.path(), self.licenses)?;
        ui::display_file_actions(&actions);
        ui::display_rule();

        let mut committed = output.commit_all(&commit_message(&data, &self.settings.tool_url))?;

        if let (Some(source), Some(src)) = (&resolved.source_path, &module.src) {
            let dir = module.data_dir();
            let vendored = if module.submodule {
                ui::display_status(&format!("Submodule {} at {}", dir, resolved.hash));
                vendor.submodule(&dir, src, &resolved.hash)?
            } else {
                ui::display_status(&format!("Subtree {} at {}", dir, resolved.hash));
                vendor.subtree(&dir, source, &resolved.hash)?
            };
            committed |= vendored;
        }

        if committed {
            ui::display_success(&format!("Committed {} {}", repo, version));
        } else {
            ui::display_status(&format!("{} is up to date", repo));
        }

        Ok(ModuleStatus::Updated { version, committed })
    }

    /// Process every module in order, recording failures without stopping.
    pub fn run(&self, modules: &[&ModuleConfig]) -> Vec<ModuleOutcome> {
        modules
            .iter()
            .map(|module| {
                ui::start_group(&module.name, "Updating");
                let status = match self.process(module) {
                    Ok(status) => status,
                    Err(e) => {
                        ui::display_error(&format!("{}: {}", module.name, e));
                        ModuleStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                ui::end_group();
                ModuleOutcome {
                    name: module.name.clone(),
                    status,
                    pushed: false,
                }
            })
            .collect()
    }
}

/// Push one generated repository, over HTTPS with credentials when both a
/// user and a token are configured.
pub fn push_module(settings: &Settings, module: &ModuleConfig) -> Result<()> {
    let repo = module.repo_name();
    ui::display_status(&format!("Pushing: {}", repo));
    let output = Git2Repository::open(settings.output_dir(&repo))?;

    match (&settings.user, &settings.token) {
        (Some(user), Some(token)) => {
            let credentials = HttpsCredentials {
                user: user.clone(),
                token: token.clone(),
            };
            output.push_all(Some(&settings.repo_https(&repo)), Some(&credentials))
        }
        _ => output.push_all(None, None),
    }
}

/// Refuse `--push` when the hosting client cannot write
pub fn check_push_allowed<H: HostingClient>(push: bool, hosting: &H) -> Result<()> {
    if push && !hosting.can_write() {
        return Err(MirrorError::config("--push requires GH_TOKEN"));
    }
    Ok(())
}

/// Main mirror workflow
///
/// # Arguments
///
/// * `args` - Workflow arguments (modules, push, dry_run, tool_repo)
/// * `config` - Loaded module configuration
///
/// # Returns
///
/// One outcome per selected module, in declaration order
pub fn run_mirror_workflow(args: &MirrorWorkflowArgs, config: &Config) -> Result<Vec<ModuleOutcome>> {
    let hosting = GitHubClient::new(config.settings.token.clone());
    check_push_allowed(args.push, &hosting)?;

    for name in &args.modules {
        if !config.modules.iter().any(|m| &m.name == name) {
            ui::display_error(&format!("Unknown module '{}'", name));
        }
    }
    let modules = config.selected_modules(&args.modules);

    let tool_repo = Git2Repository::discover(&args.tool_repo)?;
    let tool = describe(&tool_repo, "HEAD")?;
    ui::display_status(&format!(
        "Tool version: {} {}",
        tool.version,
        tool.version.to_tuple()
    ));

    let licenses = LicenseCache::new(SpdxSource::new());
    let pipeline = Pipeline::new(&config.settings, &tool, &hosting, &licenses, args.dry_run);
    let mut outcomes = pipeline.run(&modules);

    if args.push && !args.dry_run {
        for (outcome, module) in outcomes.iter_mut().zip(modules.iter()) {
            if !matches!(outcome.status, ModuleStatus::Updated { .. }) {
                continue;
            }
            ui::start_group(&module.name, "Pushing");
            match push_module(&config.settings, module) {
                Ok(()) => outcome.pushed = true,
                Err(e) => {
                    ui::display_error(&format!("{}: {}", module.name, e));
                    outcome.status = ModuleStatus::Failed {
                        error: e.to_string(),
                    };
                }
            }
            ui::end_group();
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn module(src: Option<&str>) -> ModuleConfig {
        ModuleConfig {
            name: "serv".to_string(),
            kind: "cpu".to_string(),
            contents: "verilog".to_string(),
            license_spdx: "ISC".to_string(),
            src: src.map(str::to_string),
            branch: "master".to_string(),
            gen_src: None,
            git_describe: None,
            git_hash: None,
            submodule: false,
            extra: Default::default(),
        }
    }

    fn tool() -> Describe {
        Describe {
            description: "v1.2-0-gabcdef0".to_string(),
            version: ParsedVersion::parse("1.2").unwrap(),
        }
    }

    #[test]
    fn test_build_module_data_composes_versions() {
        let data = resolve_literal_source("v3.4.5", "0123456789").unwrap();
        let out = build_module_data(&module(None), &Settings::default(), &tool(), &data);

        assert_eq!(out.get("repo"), Some("pythondata-cpu-serv"));
        assert_eq!(out.get("dir"), Some("pythondata_cpu_serv/verilog"));
        assert_eq!(out.get("tool_version_tuple"), Some("(1, 2, None)"));
        assert_eq!(out.get("data_version_tuple"), Some("(3, 4, 5)"));
        assert_eq!(out.get("version"), Some("3.5.post7"));
        assert_eq!(out.get("version_tuple"), Some("(3, 5, 7)"));
        assert!(!out.contains("src"));
        assert!(!out.contains("data_git_msg"));
    }

    #[test]
    fn test_resolve_upstream_reconciles_and_purges() {
        let mut repo = MockRepository::new();
        repo.add_commit("1cf70ea2aaaa", "Initial import");
        repo.add_commit("5f0c7a7bbbbb", "Add decoder\n\nLonger body");
        repo.add_tag("not-a-version", "5f0c7a7bbbbb");

        let resolved = resolve_upstream(&repo, "master").unwrap();
        assert_eq!(resolved.description, "v0.0-1-g5f0c7a7");
        assert_eq!(resolved.hash, "5f0c7a7bbbbb");
        assert_eq!(resolved.version.to_string(), "0.0.post1");
        assert_eq!(resolved.warnings.len(), 2);
        assert_eq!(repo.created_tags(), vec!["v0.0".to_string()]);
        assert_eq!(repo.deleted_tags(), vec!["not-a-version".to_string()]);
    }

    #[test]
    fn test_commit_message_quotes_upstream() {
        let mut repo = MockRepository::new();
        repo.add_commit("1cf70ea2aaaa", "Add decoder\n\nLonger body");
        let resolved = resolve_upstream(&repo, "master").unwrap();
        let out = build_module_data(
            &module(Some("https://github.com/olofk/serv.git")),
            &Settings::default(),
            &tool(),
            &resolved,
        );

        let message = commit_message(&out, "https://example.com/tool");
        assert!(message.starts_with("Updating pythondata-cpu-serv to 1.2.post0\n\n"));
        assert!(message.contains(
            "Updated data to v0.0-0-g1cf70ea based on 1cf70ea2aaaa from https://github.com/olofk/serv.git.\n"
        ));
        assert!(message.contains("> Add decoder\n>\n> Longer body\n"));
        assert!(message.ends_with("Updated using 1.2 from https://example.com/tool\n"));
    }

    #[test]
    fn test_commit_message_literal_source() {
        let data = resolve_literal_source("v1.0-5-g1234567", "1234567").unwrap();
        let out = build_module_data(&module(None), &Settings::default(), &tool(), &data);
        let message = commit_message(&out, "https://example.com/tool");
        assert_eq!(
            message,
            "Updating pythondata-cpu-serv to 2.2.post5\n\nUpdated using 1.2 from https://example.com/tool\n"
        );
    }

    struct WriteAccess(bool);

    impl HostingClient for WriteAccess {
        fn update_settings(&self, _slug: &str, _settings: &RepoSettings) -> Result<bool> {
            Ok(true)
        }

        fn can_write(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_check_push_allowed() {
        assert!(check_push_allowed(false, &WriteAccess(false)).is_ok());
        assert!(check_push_allowed(true, &WriteAccess(true)).is_ok());
        let err = check_push_allowed(true, &WriteAccess(false)).unwrap_err();
        assert!(err.to_string().contains("--push requires GH_TOKEN"));
    }

    #[test]
    fn test_literal_data_version_tuple_is_release_only() {
        let data = resolve_literal_source("v1.0-5-g1234567", "1234567").unwrap();
        assert_eq!(data.version_tuple, "(1, 0)");
        let out = build_module_data(&module(None), &Settings::default(), &tool(), &data);
        assert_eq!(out.get("data_version_tuple"), Some("(1, 0)"));
        assert_eq!(out.get("version_tuple"), Some("(2, 2, 5)"));

        let single = resolve_literal_source("7", "1234567").unwrap();
        assert_eq!(single.version_tuple, "(7,)");
    }

    #[test]
    fn test_upstream_data_version_tuple_keeps_post() {
        let mut repo = MockRepository::new();
        repo.add_commit("1cf70ea2aaaa", "Initial import");
        repo.add_commit("5f0c7a7bbbbb", "Add decoder");
        let resolved = resolve_upstream(&repo, "master").unwrap();
        assert_eq!(resolved.version_tuple, "(0, 0, 1)");
        assert_eq!(resolved.source_path, None);
    }

    #[test]
    fn test_outcome_failure() {
        let outcome = ModuleOutcome {
            name: "x".to_string(),
            status: ModuleStatus::Failed {
                error: "boom".to_string(),
            },
            pushed: false,
        };
        assert!(outcome.is_failure());
    }
}
