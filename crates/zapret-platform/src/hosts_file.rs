//! OS hosts file access with permission repair
//!
//! Writes go through a temp file in the same directory and a rename, falling
//! back to an in-place write. When the OS refuses with `PermissionDenied` the
//! file's attributes, owner and ACL are repaired step by step, retrying the
//! write after each step. Every step is logged and non-fatal.

use crate::command::{to_args, CommandRunner, SystemRunner};
use crate::error::{PlatformError, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zapret_core::hosts::{present_domains, remove_domains, replace_entries};

/// Well-known SIDs: Administrators, SYSTEM, Authenticated Users
const GRANT_SIDS: &[(&str, &str)] = &[
    ("*S-1-5-32-544", "F"),
    ("*S-1-5-18", "F"),
    ("*S-1-5-11", "M"),
];

/// Group names for systems where SID grants are refused (English, Russian)
const GRANT_GROUPS: &[(&str, &str)] = &[
    ("Administrators", "F"),
    ("Администраторы", "F"),
    ("Users", "M"),
    ("Пользователи", "M"),
];

/// One stage of the permission repair escalation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairStep {
    /// Short name for logs
    pub name: &'static str,
    /// Commands run in order; a failing command does not stop the step
    pub commands: Vec<(String, Vec<String>)>,
}

/// Repair steps for `path`, in escalation order (copy-through-temp excluded)
pub fn repair_steps(path: &Path) -> Vec<RepairStep> {
    let p = path.display().to_string();
    let icacls = |grants: &[(&str, &str)]| -> Vec<(String, Vec<String>)> {
        grants
            .iter()
            .map(|(who, perm)| {
                (
                    "icacls".to_string(),
                    to_args([p.clone(), "/grant".to_string(), format!("{who}:{perm}")]),
                )
            })
            .collect()
    };

    let script = format!(
        "$p = '{}'; $acl = Get-Acl -LiteralPath $p; \
         foreach ($s in 'S-1-5-32-544','S-1-5-18') {{ \
         $sid = New-Object System.Security.Principal.SecurityIdentifier($s); \
         $rule = New-Object System.Security.AccessControl.FileSystemAccessRule($sid, 'FullControl', 'Allow'); \
         $acl.SetAccessRule($rule) }}; \
         Set-Acl -LiteralPath $p -AclObject $acl",
        p.replace('\'', "''")
    );

    vec![
        RepairStep {
            name: "attributes",
            commands: vec![("attrib".into(), to_args(["-R", "-S", "-H", p.as_str()]))],
        },
        RepairStep {
            name: "ownership",
            commands: vec![("takeown".into(), to_args(["/F", p.as_str()]))],
        },
        RepairStep {
            name: "acl-sid",
            commands: icacls(GRANT_SIDS),
        },
        RepairStep {
            name: "acl-group",
            commands: icacls(GRANT_GROUPS),
        },
        RepairStep {
            name: "powershell-acl",
            commands: vec![(
                "powershell".into(),
                to_args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-Command", script.as_str()]),
            )],
        },
    ]
}

/// What an apply/remove changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostsChange {
    /// Whether the file was rewritten
    pub written: bool,
    /// Entry lines after the change that belong to the touched domains
    pub entries: usize,
}

/// The OS hosts file
pub struct HostsFile<R: CommandRunner = SystemRunner> {
    path: PathBuf,
    runner: R,
}

impl HostsFile<SystemRunner> {
    /// Hosts file at `path` using real commands for repair
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_runner(path, SystemRunner)
    }
}

impl<R: CommandRunner> HostsFile<R> {
    /// Hosts file with a custom command runner
    pub fn with_runner(path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            path: path.into(),
            runner,
        }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file; invalid UTF-8 is decoded lossily
    pub fn read(&self) -> Result<String> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(path = %self.path.display(), "Hosts file is not valid UTF-8, decoding lossily");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }

    /// Write the file, repairing permissions when needed
    pub fn write(&self, text: &str) -> Result<()> {
        match write_once(&self.path, text) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %self.path.display(), "Hosts file write denied, repairing permissions");
                self.repair_and_retry(text, || write_once(&self.path, text))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite every `managed` domain: drop its lines, then add `entries`
    ///
    /// Done in a single write so the file never holds a half-applied set.
    pub fn sync(&self, managed: &HashSet<String>, entries: &[(IpAddr, String)]) -> Result<HostsChange> {
        let current = self.read()?;
        let updated = replace_entries(&current, managed, entries);
        let written = updated != current;
        if written {
            self.write(&updated)?;
            info!(
                path = %self.path.display(),
                managed = managed.len(),
                entries = entries.len(),
                "Synced hosts entries"
            );
        }
        Ok(HostsChange {
            written,
            entries: present_domains(&updated, managed).len(),
        })
    }

    /// Drop every line for the given domains
    pub fn remove(&self, domains: &HashSet<String>) -> Result<HostsChange> {
        let current = self.read()?;
        let removed = present_domains(&current, domains).len();
        if removed == 0 {
            return Ok(HostsChange {
                written: false,
                entries: 0,
            });
        }
        self.write(&remove_domains(&current, domains))?;
        info!(path = %self.path.display(), domains = removed, "Removed hosts entries");
        Ok(HostsChange {
            written: true,
            entries: removed,
        })
    }

    /// Which of `domains` currently have an entry
    pub fn status(&self, domains: &HashSet<String>) -> Result<HashSet<String>> {
        Ok(present_domains(&self.read()?, domains))
    }

    fn repair_and_retry<F>(&self, text: &str, mut attempt: F) -> Result<()>
    where
        F: FnMut() -> io::Result<()>,
    {
        for step in repair_steps(&self.path) {
            for (program, args) in &step.commands {
                match self.runner.run(program, args) {
                    Ok(out) if out.success() => debug!(step = step.name, program = %program, "Repair command succeeded"),
                    Ok(out) => warn!(step = step.name, program = %program, code = ?out.code, stderr = %out.stderr.trim(), "Repair command failed"),
                    Err(e) => warn!(step = step.name, program = %program, error = %e, "Repair command could not run"),
                }
            }
            match attempt() {
                Ok(()) => {
                    info!(step = step.name, path = %self.path.display(), "Hosts file written after repair");
                    return Ok(());
                }
                Err(e) => debug!(step = step.name, error = %e, "Write still failing"),
            }
        }

        match self.copy_through_temp(text) {
            Ok(()) => {
                info!(path = %self.path.display(), "Hosts file written through temp copy");
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "All hosts repair steps failed");
                Err(PlatformError::permission_denied(self.path.display().to_string()))
            }
        }
    }

    fn copy_through_temp(&self, text: &str) -> Result<()> {
        let tmp = std::env::temp_dir().join(format!("zapret-hosts-{}.tmp", std::process::id()));
        fs::write(&tmp, text)?;
        let result = self
            .runner
            .run(
                "cmd",
                &to_args([
                    "/c".to_string(),
                    "copy".to_string(),
                    "/Y".to_string(),
                    tmp.display().to_string(),
                    self.path.display().to_string(),
                ]),
            )
            .and_then(|out| out.check("cmd"));
        let _ = fs::remove_file(&tmp);
        result?;

        if self.read()? == text {
            Ok(())
        } else {
            Err(PlatformError::permission_denied(self.path.display().to_string()))
        }
    }
}

/// Temp file + rename, then in-place write
fn write_once(path: &Path, text: &str) -> io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{name}.zapret.tmp"));

    let renamed = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, path));
    match renamed {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            debug!(error = %e, "Atomic hosts write failed, writing in place");
            fs::write(path, text)
        }
    }
}
