use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use hdl_mirror::cli::{run_mirror_workflow, MirrorWorkflowArgs, ModuleStatus};
use hdl_mirror::config;
use hdl_mirror::ui;

#[derive(clap::Parser)]
#[command(
    name = "hdl-mirror",
    version,
    about = "Mirror upstream HDL sources into versioned pythondata repositories"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(long, help = "Push generated repositories after updating them")]
    push: bool,

    #[arg(long, help = "Resolve and print versions without changing any repository")]
    dry_run: bool,

    #[arg(
        long,
        default_value = ".",
        help = "Repository whose describe gives the tool version"
    )]
    tool_repo: PathBuf,

    #[arg(help = "Only process these modules")]
    modules: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };

    if config.modules.is_empty() {
        ui::display_error("No modules configured in modules.toml");
        std::process::exit(1);
    }

    let workflow_args = MirrorWorkflowArgs {
        modules: args.modules,
        push: args.push,
        dry_run: args.dry_run,
        tool_repo: args.tool_repo,
    };

    let outcomes =
        run_mirror_workflow(&workflow_args, &config).context("Mirror workflow failed")?;

    println!();
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.status {
            ModuleStatus::Updated { version, committed } => {
                let state = if *committed { "updated" } else { "unchanged" };
                let pushed = if outcome.pushed { ", pushed" } else { "" };
                ui::display_success(&format!(
                    "{} {} ({}{})",
                    outcome.name, version, state, pushed
                ));
            }
            ModuleStatus::Resolved { version } => {
                ui::display_status(&format!("{} {} (dry run)", outcome.name, version));
            }
            ModuleStatus::Skipped { reason } => {
                ui::display_status(&format!("{} skipped: {}", outcome.name, reason));
            }
            ModuleStatus::Failed { error } => {
                failed += 1;
                ui::display_error(&format!("{} failed: {}", outcome.name, error));
            }
        }
    }

    if failed > 0 {
        ui::display_error(&format!("{} of {} modules failed", failed, outcomes.len()));
        std::process::exit(1);
    }

    Ok(())
}
