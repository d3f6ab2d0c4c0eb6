//! `winws.exe` process supervision
//!
//! A supervisor thread owns the child. Two reader threads tail its stdout and
//! stderr. All of them report through one bounded channel, so the consumer
//! sees [`ProcessEvent`]s in a single loop and the channel closes once the
//! supervisor is done. Nothing blocks on a full channel: events that do not
//! fit are dropped.

use crate::command::hide_window;
use crate::error::{PlatformError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use zapret_core::preset::PresetStore;
use zapret_core::LaunchMode;

/// Capacity of the event channel
pub const EVENT_CAPACITY: usize = 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A run that lasts this long resets the restart counter
const STABLE_RUN: Duration = Duration::from_secs(60);

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Something that happened to the supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Child spawned
    Started {
        /// OS process id
        pid: u32,
        /// 0 for the first launch, then the restart number
        attempt: u32,
    },
    /// One output line
    Line {
        /// Source pipe
        stream: Stream,
        /// Line without the trailing newline
        text: String,
    },
    /// Child exited
    Exited {
        /// Exit code, `None` when killed
        code: Option<i32>,
    },
    /// Child will be started again after `delay`
    Restarting {
        /// Restart number, from 1
        attempt: u32,
        /// Wait before the restart
        delay: Duration,
    },
}

/// How to launch and supervise `winws.exe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Executable
    pub exe: PathBuf,
    /// Working directory; defaults to the executable's directory
    pub work_dir: Option<PathBuf>,
    /// Arguments
    pub args: Vec<String>,
    /// Restarts after unexpected exits; 0 disables supervision
    pub restart_limit: u32,
    /// Wait before each restart
    pub restart_delay: Duration,
    /// How long `stop` waits for the supervisor
    pub stop_timeout: Duration,
}

impl LaunchConfig {
    /// Config with no restarts and default timeouts
    pub fn new(exe: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            exe: exe.into(),
            work_dir: None,
            args,
            restart_limit: 0,
            restart_delay: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Arguments for `winws.exe` from the active preset
///
/// Direct mode hands over the mirror file (`@file`); orchestrator mode
/// expands the preset inline.
pub fn launch_args(mode: LaunchMode, store: &PresetStore) -> Result<Vec<String>> {
    let preset = store.active()?.ok_or(PlatformError::NoActivePreset)?;
    match mode {
        LaunchMode::Direct => {
            let mirror = store.mirror_path();
            if !mirror.is_file() {
                store.activate(preset.name())?;
            }
            Ok(vec![format!("@{}", mirror.display())])
        }
        LaunchMode::Orchestrator => Ok(preset.to_command_args()),
    }
}

/// Handle to a running, supervised `winws.exe`
pub struct WinwsProcess {
    stop: Arc<AtomicBool>,
    pid: Arc<Mutex<Option<u32>>>,
    supervisor: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl WinwsProcess {
    /// Start the process and its supervisor
    ///
    /// The first spawn happens before returning, so a missing executable is
    /// reported here rather than through the channel.
    pub fn spawn(config: LaunchConfig) -> Result<(Self, Receiver<ProcessEvent>)> {
        if !config.exe.is_file() && config.exe.components().count() > 1 {
            return Err(PlatformError::ExecutableNotFound(config.exe.display().to_string()));
        }

        let (tx, rx) = bounded(EVENT_CAPACITY);
        let child = spawn_child(&config)?;
        let pid = Arc::new(Mutex::new(Some(child.id())));
        let stop = Arc::new(AtomicBool::new(false));

        info!(exe = %config.exe.display(), pid = child.id(), args = config.args.len(), "Started winws");
        let stop_timeout = config.stop_timeout;
        let supervisor = {
            let stop = Arc::clone(&stop);
            let pid = Arc::clone(&pid);
            thread::Builder::new()
                .name("winws-supervisor".into())
                .spawn(move || supervise(config, child, tx, stop, pid))?
        };

        Ok((
            Self {
                stop,
                pid,
                supervisor: Some(supervisor),
                stop_timeout,
            },
            rx,
        ))
    }

    /// Current process id, if a child is alive
    pub fn pid(&self) -> Option<u32> {
        *self.pid.lock()
    }

    /// Whether the supervisor is still running
    pub fn is_running(&self) -> bool {
        self.supervisor.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Kill the process tree and wait for the supervisor, up to the timeout
    pub fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(pid) = self.pid() {
            kill_tree(pid);
        }

        let Some(handle) = self.supervisor.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + self.stop_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(timeout = ?self.stop_timeout, "winws supervisor did not stop in time");
                return Err(PlatformError::Process("process did not stop in time".into()));
            }
            thread::sleep(POLL_INTERVAL / 4);
        }
        if handle.join().is_err() {
            error!("winws supervisor panicked");
        }
        info!("Stopped winws");
        Ok(())
    }
}

impl Drop for WinwsProcess {
    fn drop(&mut self) {
        if self.supervisor.is_some() {
            let _ = self.stop();
        }
    }
}

fn spawn_child(config: &LaunchConfig) -> Result<Child> {
    let mut cmd = Command::new(&config.exe);
    cmd.args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = config.work_dir.as_deref().or_else(|| exe_dir(&config.exe)) {
        cmd.current_dir(dir);
    }
    hide_window(&mut cmd);

    cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PlatformError::ExecutableNotFound(config.exe.display().to_string()),
        _ => PlatformError::Spawn {
            program: config.exe.display().to_string(),
            source: e,
        },
    })
}

fn exe_dir(exe: &Path) -> Option<&Path> {
    exe.parent().filter(|p| !p.as_os_str().is_empty())
}

fn supervise(
    config: LaunchConfig,
    first: Child,
    tx: Sender<ProcessEvent>,
    stop: Arc<AtomicBool>,
    pid: Arc<Mutex<Option<u32>>>,
) {
    let mut child = first;
    let mut attempt = 0;
    let mut restarts = 0;

    loop {
        let started = Instant::now();
        emit(&tx, ProcessEvent::Started { pid: child.id(), attempt });
        let readers = start_readers(&mut child, &tx);

        let status = wait_or_stop(&mut child, &stop);
        *pid.lock() = None;
        for reader in readers {
            let _ = reader.join();
        }

        let code = status.and_then(|s| s.code());
        debug!(?code, "winws exited");
        emit(&tx, ProcessEvent::Exited { code });

        if stop.load(Ordering::SeqCst) {
            break;
        }
        if started.elapsed() >= STABLE_RUN {
            restarts = 0;
        }
        if restarts >= config.restart_limit {
            if config.restart_limit > 0 {
                warn!(restarts, "winws restart limit reached");
            }
            break;
        }

        restarts += 1;
        attempt += 1;
        emit(
            &tx,
            ProcessEvent::Restarting {
                attempt,
                delay: config.restart_delay,
            },
        );
        if sleep_unless_stopped(config.restart_delay, &stop) {
            break;
        }

        match spawn_child(&config) {
            Ok(next) => {
                info!(pid = next.id(), attempt, "Restarted winws");
                *pid.lock() = Some(next.id());
                child = next;
            }
            Err(e) => {
                error!(error = %e, "Failed to restart winws");
                break;
            }
        }
    }
}

/// Wait for exit, killing the child once `stop` is raised
fn wait_or_stop(child: &mut Child, stop: &AtomicBool) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Failed to poll winws");
                return None;
            }
        }
        if stop.load(Ordering::SeqCst) {
            if let Err(e) = child.kill() {
                debug!(error = %e, "Kill after stop request failed");
            }
            return child.wait().ok();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Returns `true` when interrupted by `stop`
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if stop.load(Ordering::SeqCst) {
            return true;
        }
        thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }
    stop.load(Ordering::SeqCst)
}

fn start_readers(child: &mut Child, tx: &Sender<ProcessEvent>) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        readers.extend(spawn_reader(out, Stream::Stdout, tx.clone()));
    }
    if let Some(err) = child.stderr.take() {
        readers.extend(spawn_reader(err, Stream::Stderr, tx.clone()));
    }
    readers
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    stream: Stream,
    tx: Sender<ProcessEvent>,
) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name(format!("winws-{stream:?}").to_lowercase())
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            let mut dropped = 0usize;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
                        match tx.try_send(ProcessEvent::Line { stream, text }) {
                            Ok(()) => {}
                            // keep reading so the child never stalls on a full pipe
                            Err(TrySendError::Full(_)) => dropped += 1,
                            Err(TrySendError::Disconnected(_)) => break,
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, ?stream, "winws pipe closed");
                        break;
                    }
                }
            }
            if dropped > 0 {
                warn!(dropped, ?stream, "Event channel full, dropped winws output lines");
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "Failed to start pipe reader");
            None
        }
    }
}

/// Send a lifecycle event without blocking the supervisor
fn emit(tx: &Sender<ProcessEvent>, event: ProcessEvent) {
    if let Err(TrySendError::Full(event)) = tx.try_send(event) {
        warn!(?event, "Event channel full, dropped event");
    }
}

/// Kill a process and its children
fn kill_tree(pid: u32) {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T", "/F"]);
        hide_window(&mut cmd);
        match cmd.output() {
            Ok(out) if out.status.success() => debug!(pid, "taskkill succeeded"),
            Ok(out) => debug!(pid, code = ?out.status.code(), "taskkill failed"),
            Err(e) => warn!(pid, error = %e, "taskkill could not run"),
        }
    }
    #[cfg(not(windows))]
    debug!(pid, "Stop requested; the supervisor kills the child");
}
