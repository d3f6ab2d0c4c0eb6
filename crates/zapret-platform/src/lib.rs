//! Zapret Platform Layer
//!
//! OS interaction for the Zapret manager:
//!
//! - **hosts_file** - hosts file writes with permission repair
//! - **process** - `winws.exe` launch and supervision
//! - **autostart** - per-user logon entry
//! - **command** - external command seam shared by the above

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result, PERMISSION_HINT};

pub mod autostart;
pub mod command;
pub mod elevation;
pub mod hosts_file;
pub mod process;

pub use autostart::Autostart;
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use elevation::is_elevated;
pub use hosts_file::{HostsChange, HostsFile};
pub use process::{launch_args, LaunchConfig, ProcessEvent, Stream, WinwsProcess};
