//! Template tree rendering.
//!
//! The template directory mirrors the layout of a generated repository.
//! Path segments of the form `__key__` are replaced with module data values,
//! files ending in `.hbs` are rendered with Handlebars and everything else is
//! copied verbatim.

use std::fs;
use std::path::{Component, Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::{MirrorError, Result};
use crate::license::{LicenseCache, LicenseSource};

/// Suffix marking a file as a template
pub const TEMPLATE_SUFFIX: &str = ".hbs";

const SKIPPED_EXTENSIONS: &[&str] = &["swp", "swo"];

/// Ordered key/value data describing one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleData {
    entries: Vec<(String, String)>,
}

impl ModuleData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, keeping its original position when it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileActionKind {
    Creating,
    Rendering,
    Copying,
}

/// One step taken while rendering a template tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    pub kind: FileActionKind,
    pub target: PathBuf,
    /// Template path, or the SPDX id for a generated LICENSE
    pub source: String,
}

pub struct TemplateRenderer<'a> {
    handlebars: Handlebars<'a>,
    template_dir: PathBuf,
}

impl<'a> TemplateRenderer<'a> {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        TemplateRenderer {
            handlebars,
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Render a template string; non-empty output always ends with a newline
    pub fn render_string(&self, template: &str, data: &ModuleData) -> Result<String> {
        let mut rendered = self
            .handlebars
            .render_template(template, &data.to_json())
            .map_err(|e| MirrorError::template(e.to_string()))?;
        if !rendered.is_empty() && !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// Map a path relative to the template directory onto the output tree,
    /// substituting `__key__` segments.
    pub fn repo_path(&self, data: &ModuleData, relative: &Path) -> Result<PathBuf> {
        let mut out = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_string_lossy();
                    out.push(substitute_segment(&segment, data)?);
                }
                Component::ParentDir => {
                    out.pop();
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Render the whole template tree into `output_dir` and write `LICENSE`
    /// from the cache when the output has none.
    pub fn render_tree<S: LicenseSource>(
        &self,
        data: &ModuleData,
        output_dir: &Path,
        licenses: &LicenseCache<S>,
    ) -> Result<Vec<FileAction>> {
        let mut actions = Vec::new();
        fs::create_dir_all(output_dir)?;

        for entry in WalkDir::new(&self.template_dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry.map_err(|e| MirrorError::template(e.to_string()))?;
            let path = entry.path();
            let relative = path
                .strip_prefix(&self.template_dir)
                .map_err(|_| MirrorError::template(format!("{} escapes the template dir", path.display())))?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let target = output_dir.join(self.repo_path(data, relative)?);
            let source = path.display().to_string();

            if entry.file_type().is_dir() {
                if !target.exists() {
                    fs::create_dir_all(&target)?;
                    actions.push(FileAction {
                        kind: FileActionKind::Creating,
                        target,
                        source,
                    });
                }
                continue;
            }

            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if SKIPPED_EXTENSIONS.contains(&extension) {
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let target_name = target.to_string_lossy().to_string();
            if let Some(stripped) = target_name.strip_suffix(TEMPLATE_SUFFIX) {
                let template = fs::read_to_string(path)?;
                let target = PathBuf::from(stripped);
                fs::write(&target, self.render_string(&template, data)?)?;
                actions.push(FileAction {
                    kind: FileActionKind::Rendering,
                    target,
                    source,
                });
            } else {
                fs::copy(path, &target)?;
                actions.push(FileAction {
                    kind: FileActionKind::Copying,
                    target,
                    source,
                });
            }
        }

        let license_file = output_dir.join("LICENSE");
        if !license_file.exists() {
            let spdx = data
                .get("license_spdx")
                .ok_or_else(|| MirrorError::template("module data has no license_spdx"))?;
            fs::write(&license_file, licenses.get(spdx)?)?;
            actions.push(FileAction {
                kind: FileActionKind::Creating,
                target: license_file,
                source: spdx.to_string(),
            });
        }

        Ok(actions)
    }
}

fn substitute_segment(segment: &str, data: &ModuleData) -> Result<String> {
    if segment.len() > 4 && segment.starts_with("__") && segment.ends_with("__") {
        let key = &segment[2..segment.len() - 2];
        return data
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| MirrorError::template(format!("no value for path key '{}'", key)));
    }
    Ok(segment.to_string())
}
