//! Zapret Manager CLI
//!
//! Command-line front end for presets, hosts proxying and the winws process.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;
use commands::completions::CompletionsArgs;
use commands::{Command, Context};

fn main() -> Result<()> {
    let args = Args::parse();

    // Scripts need no settings; name lists do
    if let Command::Completions(CompletionsArgs { shell: Some(shell), .. }) = args.command {
        commands::completions::script(shell, &mut std::io::stdout());
        return Ok(());
    }

    let ctx = Context::load(args.settings.clone())?;

    let log_dir = (!args.no_log_file).then(|| ctx.log_dir());
    let _guard = logging::init(&args, log_dir.as_deref())?;

    if !args.quiet && !args.no_banner && !args.command.is_plain_output() {
        print_banner();
    }

    let result = run(args.command, ctx);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(command: Command, mut ctx: Context) -> Result<()> {
    match command {
        Command::Preset(preset_args) => commands::preset::execute(preset_args, &mut ctx),
        Command::Hosts(hosts_args) => commands::hosts::execute(hosts_args, &ctx),
        Command::Strategy(strategy_args) => commands::strategy::execute(strategy_args, &mut ctx),
        Command::Run(run_args) => commands::run::execute(run_args, &ctx),
        Command::Logs(logs_args) => commands::logs::execute(logs_args, &mut ctx),
        Command::Config(config_args) => commands::config::execute(config_args, &ctx),
        Command::Autostart(autostart_args) => commands::autostart::execute(autostart_args, &mut ctx),
        Command::Completions(comp_args) => commands::completions::execute(comp_args, &ctx),
    }
}

fn print_banner() {
    use colored::Colorize;

    println!();
    println!("{}", "╔═══════════════════════════════════════════════════════╗".cyan());
    println!("{}{}{}",
        "║  ".cyan(),
        format!("{:<53}", concat!("Zapret Manager v", env!("CARGO_PKG_VERSION"))).green().bold(),
        "║".cyan()
    );
    println!("{}{}{}",
        "║  ".cyan(),
        format!("{:<53}", "Presets, hosts and winws control").white(),
        "║".cyan()
    );
    println!("{}", "╚═══════════════════════════════════════════════════════╝".cyan());
    println!();
}
