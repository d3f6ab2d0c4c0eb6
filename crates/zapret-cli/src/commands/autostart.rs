//! Autostart command - start winws with the user session

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::env;
use std::path::Path;
use zapret_platform::{Autostart, SystemRunner};

use super::Context;

/// Autostart command arguments
#[derive(Args, Debug)]
pub struct AutostartArgs {
    #[command(subcommand)]
    pub action: AutostartAction,
}

/// Autostart subcommands
#[derive(Subcommand, Debug)]
pub enum AutostartAction {
    /// Run `zapret run` at logon
    On,
    /// Remove the logon entry
    Off,
    /// Show whether the entry exists
    Status,
}

/// Execute autostart command
pub fn execute(args: AutostartArgs, ctx: &mut Context) -> Result<()> {
    let autostart = Autostart::new(SystemRunner);

    match args.action {
        AutostartAction::On => {
            let exe = env::current_exe().context("Failed to locate the zapret executable")?;
            let command_line = startup_command(&exe, &ctx.settings_path);
            autostart
                .enable(&command_line)
                .context("Failed to register autostart")?;
            ctx.settings.general.autostart = true;
            ctx.save_settings()?;
            println!("{} Autostart enabled", "✓".green());
            println!("  {command_line}");
        }
        AutostartAction::Off => {
            autostart.disable().context("Failed to remove autostart")?;
            ctx.settings.general.autostart = false;
            ctx.save_settings()?;
            println!("{} Autostart disabled", "✓".green());
        }
        AutostartAction::Status => match autostart.command_line().context("Failed to query autostart")? {
            Some(command_line) => {
                println!("{} Autostart enabled", "✓".green());
                println!("  {command_line}");
            }
            None => println!("{} Autostart disabled", "✗".red()),
        },
    }
    Ok(())
}

/// Command line registered for logon
fn startup_command(exe: &Path, settings: &Path) -> String {
    format!(
        "\"{}\" --settings \"{}\" --no-banner run",
        exe.display(),
        settings.display()
    )
}
