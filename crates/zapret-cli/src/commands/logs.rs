//! Logs command - send application logs to the support panel

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use zapret_core::support::collect_logs;
use zapret_core::LogShipper;

use super::Context;

/// Logs command arguments
#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub action: LogsAction,
}

/// Logs subcommands
#[derive(Subcommand, Debug)]
pub enum LogsAction {
    /// Check that the support panel is reachable
    Ping,

    /// Exchange a one-time code from the support bot for a token
    Auth {
        /// Code shown by the bot
        code: String,
    },

    /// Forget the stored token
    Logout,

    /// List the log files that would be uploaded
    List,

    /// Upload the newest logs
    Upload {
        /// What went wrong
        #[arg(short, long, default_value = "")]
        comment: String,
    },
}

/// Execute logs command
pub fn execute(args: LogsArgs, ctx: &mut Context) -> Result<()> {
    let support = &ctx.settings.support;
    let log_dir = ctx.log_dir();

    match args.action {
        LogsAction::List => {
            let files = collect_logs(&log_dir, support.max_files, support.max_file_bytes)
                .with_context(|| format!("Failed to read logs in {}", log_dir.display()))?;
            if files.is_empty() {
                println!("No log files in {}", log_dir.display());
            }
            for file in files {
                let note = if file.truncated { " (tail)".dimmed() } else { "".normal() };
                println!("  {}  {} bytes{}", file.name, file.contents.len(), note);
            }
            Ok(())
        }
        LogsAction::Logout => {
            ctx.settings.support.token = None;
            ctx.save_settings()?;
            println!("{} Token removed", "✓".green());
            Ok(())
        }
        LogsAction::Ping => {
            let shipper = LogShipper::from_settings(support, &log_dir)?;
            let elapsed = shipper
                .ping()
                .with_context(|| format!("Support panel {} is unreachable", support.base_url))?;
            println!("{} {} answered in {} ms", "✓".green(), support.base_url, elapsed.as_millis());
            Ok(())
        }
        LogsAction::Auth { code } => {
            let mut shipper = LogShipper::from_settings(support, &log_dir)?;
            let token = shipper.authenticate(&code).context("Authentication failed")?;
            ctx.settings.support.token = Some(token.token);
            ctx.save_settings()?;
            match token.expires_at {
                Some(expires) => println!("{} Authenticated, token valid until {}", "✓".green(), expires),
                None => println!("{} Authenticated", "✓".green()),
            }
            Ok(())
        }
        LogsAction::Upload { comment } => {
            let mut shipper = LogShipper::from_settings(support, &log_dir)?;
            let result = shipper.upload(&comment);

            if shipper.token().is_none() && ctx.settings.support.token.is_some() {
                ctx.settings.support.token = None;
                ctx.save_settings()?;
            }

            let receipt = result.context("Upload failed; if the token expired, run `zapret logs auth <code>`")?;
            print!("{} Logs uploaded", "✓".green());
            if let Some(id) = receipt.id {
                print!(" (id {id})");
            }
            println!();
            if let Some(message) = receipt.message {
                println!("  {message}");
            }
            Ok(())
        }
    }
}
