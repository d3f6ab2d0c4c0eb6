//! Config command - settings management

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use zapret_core::Settings;

use super::Context;

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective settings
    Show,

    /// Write a settings file with default values
    Generate {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a settings file
    Validate {
        /// Settings file (default: the active one)
        file: Option<PathBuf>,
    },

    /// Show settings and data locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let text = ctx.settings.to_toml().context("Failed to serialize settings")?;
            println!("{text}");
            Ok(())
        }
        ConfigAction::Generate { output, force } => generate(output, force),
        ConfigAction::Validate { file } => validate(file.unwrap_or_else(|| ctx.settings_path.clone())),
        ConfigAction::Paths => {
            show_paths(ctx);
            Ok(())
        }
    }
}

fn generate(output: Option<PathBuf>, force: bool) -> Result<()> {
    let settings = Settings::default();
    let toml_str = settings.to_toml().context("Failed to serialize settings")?;
    let content = format!(
        "# Zapret Manager settings\n\
         # Relative paths are resolved against paths.work_dir\n\n\
         {toml_str}"
    );

    let Some(output) = output else {
        print!("{content}");
        return Ok(());
    };

    if output.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", output.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&output, content)
        .with_context(|| format!("Failed to write settings to {}", output.display()))?;

    info!(path = %output.display(), "Generated settings file");
    eprintln!("Settings file generated: {}", output.display());
    Ok(())
}

fn validate(file: PathBuf) -> Result<()> {
    let settings = Settings::load(&file)
        .with_context(|| format!("Failed to load settings from {}", file.display()))?;

    settings.validate().context("Settings validation failed")?;

    println!("{} Settings are valid", "✓".green());
    println!("  Launch mode: {}", settings.general.launch_mode);
    println!("  Autostart:   {}", settings.general.autostart);
    println!("  Work dir:    {}", settings.paths.work_dir.display());
    println!("  Support API: {}", settings.support.base_url);
    Ok(())
}

fn show_paths(ctx: &Context) {
    let paths = &ctx.settings.paths;
    let exists = |p: &std::path::Path| if p.exists() { "✓".green() } else { "✗".red() };

    println!("Settings file:");
    println!("  {} {}", exists(ctx.settings_path.as_path()), ctx.settings_path.display());
    println!();
    println!("Data locations:");
    for (label, path) in [
        ("work dir", paths.work_dir.clone()),
        ("winws.exe", paths.winws_exe()),
        ("presets", paths.presets_dir()),
        ("active preset", paths.active_preset_file()),
        ("strategies", paths.strategies_dir()),
        ("hosts catalog", paths.hosts_catalog()),
        ("user hosts", paths.user_hosts()),
        ("hosts file", paths.hosts_file()),
        ("logs", paths.log_dir()),
    ] {
        println!("  {} {:<14} {}", exists(path.as_path()), label, path.display());
    }
}
