//! Start with the user session via the `HKCU\...\Run` key
//!
//! `reg.exe` is used instead of the registry API so the same
//! [`CommandRunner`] seam covers it in tests.

use crate::command::{to_args, CommandRunner};
use crate::error::Result;
use tracing::{debug, info};

/// Per-user autostart key
pub const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

/// Value name used for the entry
pub const VALUE_NAME: &str = "ZapretGUI";

/// Autostart entry manager
pub struct Autostart<R: CommandRunner> {
    runner: R,
    name: String,
}

impl<R: CommandRunner> Autostart<R> {
    /// Manager for the default value name
    pub fn new(runner: R) -> Self {
        Self::with_name(runner, VALUE_NAME)
    }

    /// Manager for a custom value name
    pub fn with_name(runner: R, name: impl Into<String>) -> Self {
        Self {
            runner,
            name: name.into(),
        }
    }

    /// Register `command_line` to run at logon, replacing any existing entry
    pub fn enable(&self, command_line: &str) -> Result<()> {
        self.runner
            .run(
                "reg",
                &to_args(["add", RUN_KEY, "/v", self.name.as_str(), "/t", "REG_SZ", "/d", command_line, "/f"]),
            )?
            .check("reg")?;
        info!(name = %self.name, "Autostart enabled");
        Ok(())
    }

    /// Remove the entry; a missing entry is not an error
    pub fn disable(&self) -> Result<()> {
        if !self.is_enabled()? {
            debug!(name = %self.name, "Autostart already disabled");
            return Ok(());
        }
        self.runner
            .run("reg", &to_args(["delete", RUN_KEY, "/v", self.name.as_str(), "/f"]))?
            .check("reg")?;
        info!(name = %self.name, "Autostart disabled");
        Ok(())
    }

    /// Whether the entry exists
    pub fn is_enabled(&self) -> Result<bool> {
        let out = self
            .runner
            .run("reg", &to_args(["query", RUN_KEY, "/v", self.name.as_str()]))?;
        Ok(out.success())
    }

    /// Registered command line, if any
    pub fn command_line(&self) -> Result<Option<String>> {
        let out = self
            .runner
            .run("reg", &to_args(["query", RUN_KEY, "/v", self.name.as_str()]))?;
        if !out.success() {
            return Ok(None);
        }
        Ok(out.stdout.lines().find_map(|line| {
            let rest = line.trim().strip_prefix(self.name.as_str())?;
            let rest = rest.trim_start().strip_prefix("REG_SZ")?;
            Some(rest.trim().to_string())
        }))
    }
}
