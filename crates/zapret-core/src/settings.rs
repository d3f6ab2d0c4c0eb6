//! Application settings
//!
//! A single TOML file replaces the per-user registry toggles: launch mode,
//! autostart, file locations, strategy list preferences and the support
//! panel account. Every section is `#[serde(default)]` so partial files load.

use crate::error::{Error, Result};
use crate::strategy::{SortKey, SortOrder, StrategyFilter};
use crate::util::write_atomic;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application name used for per-user directories
pub const APP_NAME: &str = "zapret-gui";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.toml";

/// How `winws.exe` receives its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// `winws.exe @<active preset file>`, one process, no restarts
    #[default]
    Direct,
    /// Arguments expanded inline from the active preset, restarted on exit
    Orchestrator,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LaunchMode::Direct => "direct",
            LaunchMode::Orchestrator => "orchestrator",
        })
    }
}

impl FromStr for LaunchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(LaunchMode::Direct),
            "orchestrator" | "orchestra" => Ok(LaunchMode::Orchestrator),
            _ => Err(Error::settings_value("general.launch_mode", format!("unknown mode '{s}'"))),
        }
    }
}

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Launch behaviour
    pub general: GeneralSettings,
    /// File locations
    pub paths: PathSettings,
    /// Strategy list preferences
    pub strategies: StrategySettings,
    /// Support panel client
    pub support: SupportSettings,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::SettingsNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(Error::from)
    }

    /// Write settings, creating the parent directory
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_atomic(path, &self.to_toml()?)
    }

    /// Per-user settings file, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(SETTINGS_FILE))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.general.launch_mode == LaunchMode::Orchestrator && self.general.restart_limit == 0 {
            return Err(Error::settings_value(
                "general.restart_limit",
                "must be at least 1 in orchestrator mode",
            ));
        }
        if self.general.stop_timeout_ms == 0 {
            return Err(Error::settings_value("general.stop_timeout_ms", "must be non-zero"));
        }

        let url = self.support.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::settings_value(
                "support.base_url",
                "must start with http:// or https://",
            ));
        }
        if self.support.timeout_secs == 0 {
            return Err(Error::settings_value("support.timeout_secs", "must be non-zero"));
        }
        if self.support.max_files == 0 {
            return Err(Error::settings_value("support.max_files", "must be at least 1"));
        }
        if self.support.max_file_bytes < 1024 {
            return Err(Error::settings_value("support.max_file_bytes", "must be at least 1024"));
        }
        Ok(())
    }
}

/// Launch behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Start with the user session
    pub autostart: bool,
    /// How to hand arguments to `winws.exe`
    pub launch_mode: LaunchMode,
    /// Orchestrator restarts before giving up
    pub restart_limit: u32,
    /// Delay before an orchestrator restart
    pub restart_delay_ms: u64,
    /// How long `stop` waits after killing the process tree
    pub stop_timeout_ms: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            autostart: false,
            launch_mode: LaunchMode::Direct,
            restart_limit: 5,
            restart_delay_ms: 2000,
            stop_timeout_ms: 5000,
        }
    }
}

/// File locations
///
/// Relative paths are resolved against `work_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Base directory of the zapret installation
    pub work_dir: PathBuf,
    /// `winws.exe`
    pub winws_exe: PathBuf,
    /// Directory holding `<name>.txt` presets
    pub presets_dir: PathBuf,
    /// File passed to `winws.exe @file`
    pub active_preset_file: PathBuf,
    /// Directory with `.bat`/`.json` strategies
    pub strategies_dir: PathBuf,
    /// `hosts.ini` catalog
    pub hosts_catalog: PathBuf,
    /// `user_hosts.ini` selections
    pub user_hosts: PathBuf,
    /// OS hosts file
    pub hosts_file: PathBuf,
    /// Application log directory
    pub log_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let work_dir = project_dirs()
            .map(|d| d.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("zapret"));
        Self {
            log_dir: work_dir.join("logs"),
            work_dir,
            winws_exe: PathBuf::from("bin").join("winws.exe"),
            presets_dir: PathBuf::from("presets"),
            active_preset_file: PathBuf::from("preset-active.txt"),
            strategies_dir: PathBuf::from("strategies"),
            hosts_catalog: PathBuf::from("json").join("hosts.ini"),
            user_hosts: PathBuf::from("user_hosts.ini"),
            hosts_file: system_hosts_file(),
        }
    }
}

impl PathSettings {
    /// Resolve `path` against `work_dir` unless it is absolute
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Resolved `winws.exe`
    pub fn winws_exe(&self) -> PathBuf {
        self.resolve(&self.winws_exe)
    }

    /// Resolved presets directory
    pub fn presets_dir(&self) -> PathBuf {
        self.resolve(&self.presets_dir)
    }

    /// Resolved active preset mirror
    pub fn active_preset_file(&self) -> PathBuf {
        self.resolve(&self.active_preset_file)
    }

    /// Resolved strategies directory
    pub fn strategies_dir(&self) -> PathBuf {
        self.resolve(&self.strategies_dir)
    }

    /// Resolved hosts catalog
    pub fn hosts_catalog(&self) -> PathBuf {
        self.resolve(&self.hosts_catalog)
    }

    /// Resolved user selections file
    pub fn user_hosts(&self) -> PathBuf {
        self.resolve(&self.user_hosts)
    }

    /// Resolved OS hosts file
    pub fn hosts_file(&self) -> PathBuf {
        self.resolve(&self.hosts_file)
    }

    /// Resolved log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }
}

/// Strategy list preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Sort column
    pub sort_key: SortKey,
    /// Sort direction
    pub sort_order: SortOrder,
    /// Strategy id last applied from the list
    pub last_applied: Option<String>,
    /// Last used filter
    pub filter: StrategyFilter,
}

/// Support panel client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    /// Panel base URL, without the `/api` suffix
    pub base_url: String,
    /// Identifier sent with every request (defaults to the machine name)
    pub client_id: String,
    /// Bearer token from the auth code handshake
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Newest log files to upload
    pub max_files: usize,
    /// Per-file size cap; larger files are trimmed to their tail
    pub max_file_bytes: u64,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            base_url: "https://support.zapret.local".to_string(),
            client_id: String::new(),
            token: None,
            timeout_secs: 30,
            max_files: 3,
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

impl SupportSettings {
    /// Configured client id, or the machine name when none is set
    pub fn effective_client_id(&self) -> String {
        let configured = self.client_id.trim();
        if !configured.is_empty() {
            return configured.to_string();
        }
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "zapret-client".to_string())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

fn system_hosts_file() -> PathBuf {
    if cfg!(windows) {
        let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
        PathBuf::from(root)
            .join("System32")
            .join("drivers")
            .join("etc")
            .join("hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}
