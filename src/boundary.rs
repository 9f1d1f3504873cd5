use std::fmt;

use crate::analyzer::TagReport;

/// Non-fatal conditions met while reconciling a repository's tags.
/// They are reported to the user and the run continues.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileWarning {
    /// Tag exists but cannot be parsed as a version; it will be purged
    MalformedTag { tag: String, reason: String },
    /// No `0.0` tag existed, so one was created on the oldest commit
    MissingBaseline { tag: String, commit: String },
    /// Module source has no hosting repository to publish to
    MissingHostingRepo { slug: String },
}

impl ReconcileWarning {
    /// Warnings implied by a reconciliation report, baseline first
    pub fn from_report(report: &TagReport, baseline_tag: &str) -> Vec<ReconcileWarning> {
        let mut warnings = Vec::new();
        if let Some(commit) = &report.baseline {
            warnings.push(ReconcileWarning::MissingBaseline {
                tag: baseline_tag.to_string(),
                commit: commit.clone(),
            });
        }
        warnings.extend(report.ignored.iter().map(|tag| ReconcileWarning::MalformedTag {
            tag: tag.raw.clone(),
            reason: tag.reason.clone(),
        }));
        warnings
    }
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileWarning::MalformedTag { tag, reason } => {
                write!(f, "Ignoring tag '{}': {}", tag, reason)
            }
            ReconcileWarning::MissingBaseline { tag, commit } => {
                let short_hash = if commit.len() > 7 {
                    &commit[..7]
                } else {
                    commit.as_str()
                };
                write!(
                    f,
                    "No baseline tag found, created '{}' on first commit {}",
                    tag, short_hash
                )
            }
            ReconcileWarning::MissingHostingRepo { slug } => {
                write!(f, "No hosting repository '{}', skipping", slug)
            }
        }
    }
}
