//! CLI commands

pub mod autostart;
pub mod completions;
pub mod config;
pub mod hosts;
pub mod logs;
pub mod preset;
pub mod run;
pub mod strategy;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use std::path::PathBuf;
use tracing::debug;
use zapret_core::{PresetStore, Settings};

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage presets (argument files for winws.exe)
    Preset(preset::PresetArgs),

    /// Proxy services through the hosts file
    Hosts(hosts::HostsArgs),

    /// Browse available strategies
    Strategy(strategy::StrategyArgs),

    /// Run winws.exe with the active preset
    Run(run::RunArgs),

    /// Send logs to the support panel
    Logs(logs::LogsArgs),

    /// Settings management
    Config(config::ConfigArgs),

    /// Start with the user session
    Autostart(autostart::AutostartArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Command {
    /// Whether the command prints machine-readable output on stdout
    pub fn is_plain_output(&self) -> bool {
        matches!(
            self,
            Command::Completions(_)
                | Command::Config(config::ConfigArgs {
                    action: config::ConfigAction::Show | config::ConfigAction::Generate { .. },
                })
                | Command::Strategy(strategy::StrategyArgs {
                    action: strategy::StrategyAction::List(strategy::ListArgs { json: true, .. }),
                })
                | Command::Preset(preset::PresetArgs {
                    action: preset::PresetAction::Show { raw: true, .. },
                })
        )
    }
}

/// Settings plus where they came from
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded settings
    pub settings: Settings,
    /// File the settings are saved back to
    pub settings_path: PathBuf,
}

impl Context {
    /// Load settings from `path`, or from the per-user default location
    ///
    /// A missing file yields defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let settings_path = match path {
            Some(path) => path,
            None => Settings::default_path()
                .context("Could not determine the per-user config directory; pass --settings")?,
        };
        let settings = Settings::load_or_default(&settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
        debug!(path = %settings_path.display(), "Loaded settings");
        Ok(Self {
            settings,
            settings_path,
        })
    }

    /// Preset store over the configured directories
    pub fn presets(&self) -> PresetStore {
        PresetStore::new(
            self.settings.paths.presets_dir(),
            self.settings.paths.active_preset_file(),
        )
    }

    /// Write the settings back to their file
    pub fn save_settings(&self) -> Result<()> {
        self.settings
            .save(&self.settings_path)
            .with_context(|| format!("Failed to save settings to {}", self.settings_path.display()))
    }

    /// Log directory of the application
    pub fn log_dir(&self) -> PathBuf {
        self.settings.paths.log_dir()
    }
}

