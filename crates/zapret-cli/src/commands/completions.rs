//! Completions command - shell scripts plus dynamic name lists
//!
//! `zapret completions bash` prints a static script. Preset, service and
//! strategy names change at runtime, so custom completion functions can ask
//! for them with `zapret completions --names presets`.

use anyhow::{Context as _, Result};
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};
use std::io::{self, Write};
use tracing::debug;
use zapret_core::hosts::HostsCatalog;
use zapret_core::StrategyCatalog;

use super::Context;
use crate::args::Args as CliArgs;

const BIN_NAME: &str = "zapret";

/// Completions command arguments
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for
    #[arg(value_enum, required_unless_present = "names")]
    pub shell: Option<Shell>,

    /// Print names of one kind, one per line, instead of a script
    #[arg(long, value_enum, conflicts_with = "shell")]
    pub names: Option<NameKind>,
}

/// Runtime names that can be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NameKind {
    /// Stored presets
    Presets,
    /// Hosts catalog services
    Services,
    /// Hosts catalog DNS profiles
    Profiles,
    /// Strategy ids
    Strategies,
}

/// Write the completion script for `shell`
pub fn script(shell: Shell, out: &mut dyn Write) {
    generate(shell, &mut CliArgs::command(), BIN_NAME, out);
}

/// Execute completions command
pub fn execute(args: CompletionsArgs, ctx: &Context) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Some(shell) = args.shell {
        script(shell, &mut stdout);
        return Ok(());
    }

    let Some(kind) = args.names else {
        return Ok(());
    };
    for name in names(kind, ctx) {
        writeln!(stdout, "{name}").context("Failed to write names")?;
    }
    Ok(())
}

/// Names of one kind; a missing or broken source yields none
fn names(kind: NameKind, ctx: &Context) -> Vec<String> {
    let paths = &ctx.settings.paths;
    let found: anyhow::Result<Vec<String>> = match kind {
        NameKind::Presets => ctx
            .presets()
            .list()
            .map(|entries| entries.into_iter().map(|e| e.name).collect())
            .map_err(anyhow::Error::from),
        NameKind::Services | NameKind::Profiles => HostsCatalog::load(paths.hosts_catalog())
            .map(|catalog| match kind {
                NameKind::Services => catalog.service_names().into_iter().map(str::to_string).collect(),
                _ => catalog.profiles().to_vec(),
            })
            .map_err(anyhow::Error::from),
        NameKind::Strategies => StrategyCatalog::load_dir(paths.strategies_dir())
            .map(|catalog| catalog.all().iter().map(|s| s.id.clone()).collect())
            .map_err(anyhow::Error::from),
    };

    found.unwrap_or_else(|e| {
        debug!(?kind, error = %e, "No completion names");
        Vec::new()
    })
}
