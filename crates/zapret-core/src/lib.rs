//! # Zapret Core
//!
//! Platform-independent logic behind the Zapret manager.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Presets** - `winws.exe` argument files with header, base args and
//!   per-category blocks, plus the store that activates them
//! - **Hosts** - the `hosts.ini` catalog, user selections and text
//!   transforms over the OS hosts file
//! - **Strategies** - BAT and JSON strategy sources, filtering and sorting
//! - **Settings** - TOML settings replacing the registry toggles
//! - **Support** - log collection and the support panel client
//!
//! ## Example
//!
//! ```rust,no_run
//! use zapret_core::preset::PresetStore;
//! use zapret_core::Settings;
//!
//! let settings = Settings::load("settings.toml")?;
//! let store = PresetStore::new(settings.paths.presets_dir(), settings.paths.active_preset_file());
//!
//! let args = vec!["--dpi-desync=fake,multisplit".to_string()];
//! store.apply_strategy("Default", "youtube", None, &args)?;
//! store.activate("Default")?;
//! # Ok::<(), zapret_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod hosts;
pub mod preset;
pub mod settings;
pub mod strategy;
pub mod support;

mod util;

// Re-exports for convenience
pub use error::{Error, Result};
pub use hosts::{HostsCatalog, UserSelections};
pub use preset::{Preset, PresetStore, Protocol};
pub use settings::{LaunchMode, Settings};
pub use strategy::{StrategyCatalog, StrategyInfo};
pub use support::LogShipper;
