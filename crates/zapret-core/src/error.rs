//! Error types for zapret-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for zapret-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Preset text could not be parsed or regenerated
    #[error("Preset error: {message}")]
    Preset {
        /// Detailed error message
        message: String,
        /// Line number (1-based) where the problem was found
        line: Option<usize>,
    },

    /// Preset file does not exist
    #[error("Preset not found: {name}")]
    PresetNotFound {
        /// Name of the missing preset
        name: String,
    },

    /// A preset with this name already exists
    #[error("Preset already exists: {name}")]
    PresetExists {
        /// Conflicting preset name
        name: String,
    },

    /// Preset name cannot be used as a file name
    #[error("Invalid preset name '{name}': {reason}")]
    InvalidPresetName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Category is not present in the preset
    #[error("Category '{category}' not found in preset '{preset}'")]
    CategoryNotFound {
        /// Preset that was searched
        preset: String,
        /// Missing category
        category: String,
    },

    /// Argument fragment (`--out-range=`, `--syndata=`, `--send=`) is malformed
    #[error("Invalid argument '{arg}': {message}")]
    InvalidArgument {
        /// The offending fragment
        arg: String,
        /// Error message
        message: String,
    },

    /// Hosts catalog could not be parsed
    #[error("Hosts catalog error at line {line}: {message}")]
    Catalog {
        /// Line number (1-based)
        line: usize,
        /// Error message
        message: String,
    },

    /// Unknown service or DNS profile
    #[error("Unknown {kind}: {name}")]
    UnknownEntry {
        /// What kind of entry was looked up
        kind: &'static str,
        /// Requested name
        name: String,
    },

    /// Strategy source file could not be adapted
    #[error("Strategy source '{path}': {message}")]
    StrategySource {
        /// Source file path
        path: String,
        /// Error message
        message: String,
    },

    /// Settings file not found
    #[error("Settings file not found: {path}")]
    SettingsNotFound {
        /// Path to the missing settings file
        path: String,
    },

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    SettingsValue {
        /// Settings key
        key: String,
        /// Error message
        message: String,
    },

    /// Support panel rejected the request or the token is missing
    #[error("Support panel authorization required: {0}")]
    AuthRequired(String),

    /// Support panel returned an unexpected response
    #[error("Support panel error (HTTP {status}): {message}")]
    SupportApi {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// No log files to upload
    #[error("No log files found in {dir}")]
    NoLogs {
        /// Searched directory
        dir: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a preset error
    pub fn preset(message: impl Into<String>) -> Self {
        Self::Preset {
            message: message.into(),
            line: None,
        }
    }

    /// Create a preset error pointing at a line
    pub fn preset_at(message: impl Into<String>, line: usize) -> Self {
        Self::Preset {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg: arg.into(),
            message: message.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(line: usize, message: impl Into<String>) -> Self {
        Self::Catalog {
            line,
            message: message.into(),
        }
    }

    /// Create a strategy source error
    pub fn strategy_source(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StrategySource {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a settings value error
    pub fn settings_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SettingsValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the user has to re-run the auth handshake
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired(_))
    }
}
