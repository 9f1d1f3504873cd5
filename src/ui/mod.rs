//! User interface module - CI log groups and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Grouped output around each module's pipeline

use std::io::{self, Write};

use console::style;

use crate::render::ModuleData;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_error, display_file_actions, display_status, display_success, display_tag_set,
    display_warning, format_versions,
};

fn flush() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// Open a log group for `module`. Output streams are flushed on both sides
/// so interleaved stderr lands inside the group.
pub fn start_group(module: &str, section: &str) {
    flush();
    println!();
    println!("{}", formatter::format_group_start(module, section));
    flush();
}

pub fn end_group() {
    flush();
    println!("{}", formatter::format_group_end());
    flush();
}

/// Close the running group, dump the module data in its own group, then
/// open a details group.
pub fn display_module_data(module: &str, data: &ModuleData) {
    end_group();
    println!("{}", formatter::format_group_start(module, "Config"));
    for (key, value) in data.iter() {
        println!("  {:<20} {}", style(key).cyan(), value);
    }
    println!("{}", formatter::format_group_end());
    println!("{}", formatter::format_group_start(module, "Details"));
    flush();
}

/// Headline separator printed before and after a module's file operations
pub fn display_rule() {
    println!("{}", "-".repeat(75));
}
