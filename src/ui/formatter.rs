//! Pure formatting functions for UI output.
//!
//! `format_*` functions build the text; `display_*` functions print it.

use console::style;

use crate::analyzer::TagSet;
use crate::boundary::ReconcileWarning;
use crate::render::{FileAction, FileActionKind};

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a reconciliation warning to the user.
pub fn display_warning(warning: &ReconcileWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Opening marker of a collapsible CI log group
pub fn format_group_start(module: &str, section: &str) -> String {
    format!("::group::{} {}", module, section)
}

pub fn format_group_end() -> String {
    "::endgroup::".to_string()
}

/// One line per valid tag: name, normalized version, short commit.
pub fn format_tag_set(tags: &TagSet) -> Vec<String> {
    tags.iter()
        .map(|entry| {
            let short: String = entry.commit.chars().take(7).collect();
            format!("  {:<30} {:<20} {}", entry.name, entry.version.to_string(), short)
        })
        .collect()
}

/// Display the tags found in a source repository.
pub fn display_tag_set(tags: &TagSet) {
    println!("{}", style(format!("Found {} tags:", tags.len())).bold());
    for line in format_tag_set(tags) {
        println!("{}", line);
    }
}

pub fn format_file_action(action: &FileAction) -> String {
    let verb = match action.kind {
        FileActionKind::Creating => "Creating",
        FileActionKind::Rendering => "Rendering",
        FileActionKind::Copying => "Copying",
    };
    format!(
        "{:>10} {:<60} from {}",
        verb,
        action.target.display().to_string(),
        action.source
    )
}

pub fn display_file_actions(actions: &[FileAction]) {
    for action in actions {
        println!("{}", format_file_action(action));
    }
}

/// `name version tuple` headline followed by the tool and data parts
pub fn format_versions(
    module: &str,
    version: (&str, &str),
    tool: (&str, &str),
    data: (&str, &str),
) -> Vec<String> {
    vec![
        format!("{} {} {}", module, version.0, version.1),
        format!("Tools: {} {}", tool.0, tool.1),
        format!(" Data: {} {}", data.0, data.1),
    ]
}
