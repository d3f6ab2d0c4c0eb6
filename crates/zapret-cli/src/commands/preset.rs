//! Preset command - manage winws argument files

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use zapret_core::preset::{single_line, Preset, PresetStore, Protocol};
use zapret_core::StrategyCatalog;

use super::Context;

/// Preset command arguments
#[derive(Args, Debug)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub action: PresetAction,
}

/// Preset subcommands
#[derive(Subcommand, Debug)]
pub enum PresetAction {
    /// List stored presets
    List,

    /// Show a preset (default: the active one)
    Show {
        /// Preset name
        name: Option<String>,

        /// Print the file text instead of a summary
        #[arg(long)]
        raw: bool,
    },

    /// Create an empty preset
    Create {
        /// Preset name
        name: String,

        /// Description header
        #[arg(short, long)]
        description: Option<String>,

        /// Icon color header, e.g. #4CAF50
        #[arg(long)]
        icon_color: Option<String>,
    },

    /// Delete a preset
    Delete {
        /// Preset name
        name: String,
    },

    /// Rename a preset
    Rename {
        /// Current name
        from: String,
        /// New name
        to: String,
    },

    /// Copy a preset under a new name
    Duplicate {
        /// Source preset
        from: String,
        /// New name
        to: String,
    },

    /// Make a preset active
    Activate {
        /// Preset name
        name: String,
    },

    /// Replace the strategy of a category
    ///
    /// Give the desync arguments after `--`, or pick a strategy by id.
    SetStrategy {
        /// Category, e.g. youtube or discord
        category: String,

        /// Preset to change (default: the active one)
        #[arg(short, long)]
        preset: Option<String>,

        /// Only change blocks of this protocol (tcp or udp)
        #[arg(long)]
        protocol: Option<Protocol>,

        /// Take the arguments from a strategy in the strategies directory
        #[arg(long, conflicts_with = "args")]
        strategy: Option<String>,

        /// Desync arguments
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Import a preset file
    Import {
        /// File to import
        file: PathBuf,

        /// Activate after import
        #[arg(long)]
        activate: bool,
    },

    /// Export a preset to a file
    Export {
        /// Preset name
        name: String,
        /// Destination file
        output: PathBuf,
    },
}

/// Execute preset command
pub fn execute(args: PresetArgs, ctx: &mut Context) -> Result<()> {
    let store = ctx.presets();
    match args.action {
        PresetAction::List => list(&store),
        PresetAction::Show { name, raw } => show(&store, name, raw),
        PresetAction::Create {
            name,
            description,
            icon_color,
        } => {
            let mut preset = Preset::new(&name);
            preset.header.description = description.as_deref().map(single_line);
            preset.header.icon_color = icon_color.as_deref().map(single_line);
            store
                .create(preset)
                .with_context(|| format!("Failed to create preset '{name}'"))?;
            println!("{} Created preset '{}'", "✓".green(), name);
            Ok(())
        }
        PresetAction::Delete { name } => {
            store
                .delete(&name)
                .with_context(|| format!("Failed to delete preset '{name}'"))?;
            println!("{} Deleted preset '{}'", "✓".green(), name);
            Ok(())
        }
        PresetAction::Rename { from, to } => {
            store
                .rename(&from, &to)
                .with_context(|| format!("Failed to rename preset '{from}'"))?;
            println!("{} Renamed '{}' to '{}'", "✓".green(), from, to);
            Ok(())
        }
        PresetAction::Duplicate { from, to } => {
            store
                .duplicate(&from, &to)
                .with_context(|| format!("Failed to duplicate preset '{from}'"))?;
            println!("{} Copied '{}' to '{}'", "✓".green(), from, to);
            Ok(())
        }
        PresetAction::Activate { name } => {
            store
                .activate(&name)
                .with_context(|| format!("Failed to activate preset '{name}'"))?;
            println!("{} Active preset: {}", "✓".green(), name.bold());
            println!("  Mirror: {}", store.mirror_path().display());
            Ok(())
        }
        PresetAction::SetStrategy {
            category,
            preset,
            protocol,
            strategy,
            args,
        } => set_strategy(ctx, &store, &category, preset, protocol, strategy, args),
        PresetAction::Import { file, activate } => {
            let preset = store
                .import(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("{} Imported preset '{}'", "✓".green(), preset.name());
            if activate {
                store.activate(preset.name())?;
                println!("{} Active preset: {}", "✓".green(), preset.name().bold());
            }
            Ok(())
        }
        PresetAction::Export { name, output } => {
            store
                .export(&name, &output)
                .with_context(|| format!("Failed to export preset '{name}'"))?;
            println!("{} Exported '{}' to {}", "✓".green(), name, output.display());
            Ok(())
        }
    }
}

fn list(store: &PresetStore) -> Result<()> {
    let entries = store.list().context("Failed to list presets")?;
    if entries.is_empty() {
        println!("No presets in {}", store.dir().display());
        return Ok(());
    }

    for entry in entries {
        let marker = if entry.active { "●".green() } else { " ".normal() };
        let name = if entry.active {
            entry.name.bold()
        } else {
            entry.name.normal()
        };
        print!("{marker} {name}");
        if let Some(description) = entry.description.filter(|d| !d.is_empty()) {
            print!("  {}", description.dimmed());
        }
        println!();
    }
    Ok(())
}

fn show(store: &PresetStore, name: Option<String>, raw: bool) -> Result<()> {
    let preset = match name {
        Some(name) => store
            .load(&name)
            .with_context(|| format!("Failed to load preset '{name}'"))?,
        None => match store.active()? {
            Some(preset) => preset,
            None => bail!("No active preset; pass a name or run `zapret preset activate <name>`"),
        },
    };

    if raw {
        print!("{}", preset.render());
        return Ok(());
    }

    let header = &preset.header;
    println!("{}", header.name.bold());
    if let Some(description) = &header.description {
        println!("  {description}");
    }
    if let Some(created) = &header.created {
        println!("  Created:  {created}");
    }
    if let Some(modified) = &header.modified {
        println!("  Modified: {modified}");
    }
    if !preset.base_args.is_empty() {
        println!("  Base:     {}", preset.base_args.join(" "));
    }
    println!();

    for block in &preset.blocks {
        println!(
            "  {} {}:{}",
            block.category.cyan().bold(),
            block.protocol,
            block.ports
        );
        println!("      {}", block.strategy_line());
    }
    Ok(())
}

fn set_strategy(
    ctx: &mut Context,
    store: &PresetStore,
    category: &str,
    preset: Option<String>,
    protocol: Option<Protocol>,
    strategy: Option<String>,
    args: Vec<String>,
) -> Result<()> {
    let name = match preset {
        Some(name) => name,
        None => store
            .active_name()?
            .context("No active preset; pass --preset <name>")?,
    };

    let args = match &strategy {
        Some(id) => {
            let catalog = StrategyCatalog::load_dir(ctx.settings.paths.strategies_dir())
                .context("Failed to load strategies")?;
            let info = catalog
                .get(id)
                .with_context(|| format!("Unknown strategy '{id}'"))?;
            info.desync_args(protocol)
        }
        None => args,
    };
    if args.is_empty() {
        bail!("No desync arguments given; pass them after `--` or use --strategy <id>");
    }

    let changed = store
        .apply_strategy(&name, category, protocol, &args)
        .with_context(|| format!("Failed to update preset '{name}'"))?;

    if let Some(id) = strategy {
        info!(strategy = %id, preset = %name, "Recording applied strategy");
        ctx.settings.strategies.last_applied = Some(id);
        ctx.save_settings()?;
    }

    println!(
        "{} Updated {} block(s) of '{}' in '{}'",
        "✓".green(),
        changed,
        category,
        name
    );
    Ok(())
}
