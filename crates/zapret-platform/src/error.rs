//! Platform-specific errors

use thiserror::Error;

/// Shown when every hosts-file repair step failed
pub const PERMISSION_HINT: &str = "disable your antivirus or run as administrator";

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// External command could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// External command exited with an error
    #[error("{program} exited with {code:?}: {stderr}")]
    CommandFailed {
        /// Program name
        program: String,
        /// Exit code, if any
        code: Option<i32>,
        /// Captured stderr (or stdout when stderr is empty)
        stderr: String,
    },

    /// File could not be written even after permission repair
    #[error("Permission denied writing {path}: {hint}")]
    PermissionDenied {
        /// Target path
        path: String,
        /// What the user can do about it
        hint: &'static str,
    },

    /// `winws.exe` not found
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// No active preset to launch
    #[error("No active preset; activate one first")]
    NoActivePreset,

    /// Process supervision error
    #[error("Process error: {0}")]
    Process(String),

    /// Core error
    #[error(transparent)]
    Core(#[from] zapret_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Permission error for a path with the standard hint
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            hint: PERMISSION_HINT,
        }
    }
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;
