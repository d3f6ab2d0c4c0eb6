//! Run command - start and supervise winws.exe

use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zapret_core::LaunchMode;
use zapret_platform::{is_elevated, launch_args, LaunchConfig, ProcessEvent, Stream, WinwsProcess};

use super::Context;

const EVENT_WAIT: Duration = Duration::from_millis(200);

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Launch mode (default: from settings)
    #[arg(short, long)]
    pub mode: Option<LaunchMode>,

    /// Activate this preset before starting
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Do not restart winws after it exits (orchestrator mode)
    #[arg(long)]
    pub no_restart: bool,

    /// Print the command line and exit
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs, ctx: &Context) -> Result<()> {
    let general = &ctx.settings.general;
    let mode = args.mode.unwrap_or(general.launch_mode);
    let store = ctx.presets();

    if let Some(name) = &args.preset {
        store
            .activate(name)
            .with_context(|| format!("Failed to activate preset '{name}'"))?;
    }

    let winws_args = launch_args(mode, &store).context("Failed to prepare winws arguments")?;
    let exe = ctx.settings.paths.winws_exe();

    let mut config = LaunchConfig::new(&exe, winws_args);
    config.stop_timeout = Duration::from_millis(general.stop_timeout_ms);
    config.restart_delay = Duration::from_millis(general.restart_delay_ms);
    if mode == LaunchMode::Orchestrator && !args.no_restart {
        config.restart_limit = general.restart_limit;
    }

    if args.dry_run {
        println!("{} {}", exe.display(), config.args.join(" "));
        return Ok(());
    }

    if !is_elevated() {
        warn!("Not running as administrator; winws needs elevation to capture traffic");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    info!(mode = %mode, exe = %exe.display(), restart_limit = config.restart_limit, "Starting winws");
    let (mut process, events) = WinwsProcess::spawn(config)
        .with_context(|| format!("Failed to start {}", exe.display()))?;
    println!("{} winws running ({} mode), press Ctrl+C to stop", "✓".green(), mode);

    let mut last_code = None;
    loop {
        if !running.load(Ordering::SeqCst) {
            process.stop().context("Failed to stop winws")?;
            println!("{} winws stopped", "✓".green());
            return Ok(());
        }

        match events.recv_timeout(EVENT_WAIT) {
            Ok(event) => {
                if let ProcessEvent::Exited { code } = event {
                    last_code = code;
                }
                log_event(event);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    match last_code {
        Some(0) => {
            println!("winws exited");
            Ok(())
        }
        Some(code) => bail!("winws exited with code {code}"),
        None => bail!("winws was terminated"),
    }
}

fn log_event(event: ProcessEvent) {
    match event {
        ProcessEvent::Started { pid, attempt } => info!(pid, attempt, "winws started"),
        ProcessEvent::Line {
            stream: Stream::Stdout,
            text,
        } => info!(target: "winws", "{text}"),
        ProcessEvent::Line {
            stream: Stream::Stderr,
            text,
        } => warn!(target: "winws", "{text}"),
        ProcessEvent::Exited { code } => info!(code = ?code, "winws exited"),
        ProcessEvent::Restarting { attempt, delay } => {
            warn!(attempt, delay = ?delay, "winws exited unexpectedly, restarting");
        }
    }
}
