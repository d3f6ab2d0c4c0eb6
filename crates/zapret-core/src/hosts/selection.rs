//! Per-user service -> DNS profile selections (`user_hosts.ini`)

use super::catalog::HostsCatalog;
use crate::error::Result;
use crate::util::write_atomic;
use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::warn;

const SELECTIONS_SECTION: &str = "Selections";

/// Selected DNS profile for each service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSelections {
    selections: BTreeMap<String, String>,
}

impl UserSelections {
    /// Load from file; a missing file yields no selections
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse `[Selections]` / `Service=Profile` text
    pub fn parse(text: &str) -> Self {
        let mut selections = BTreeMap::new();
        let mut in_section = false;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_section = name.trim().eq_ignore_ascii_case(SELECTIONS_SECTION);
                continue;
            }
            if !in_section {
                continue;
            }
            if let Some((service, profile)) = line.split_once('=') {
                let (service, profile) = (service.trim(), profile.trim());
                if !service.is_empty() && !profile.is_empty() {
                    selections.insert(service.to_string(), profile.to_string());
                }
            }
        }
        Self { selections }
    }

    /// Render as ini text
    pub fn render(&self) -> String {
        let mut out = format!("[{SELECTIONS_SECTION}]\n");
        for (service, profile) in &self.selections {
            out.push_str(service);
            out.push('=');
            out.push_str(profile);
            out.push('\n');
        }
        out
    }

    /// Save to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_atomic(path, &self.render())
    }

    /// Select a profile for a service
    pub fn select(&mut self, service: impl Into<String>, profile: impl Into<String>) {
        self.selections.insert(service.into(), profile.into());
    }

    /// Remove the selection for a service
    pub fn clear(&mut self, service: &str) -> bool {
        self.selections.remove(service).is_some()
    }

    /// Selected profile of a service
    pub fn get(&self, service: &str) -> Option<&str> {
        self.selections.get(service).map(String::as_str)
    }

    /// `(service, profile)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.selections.iter().map(|(s, p)| (s.as_str(), p.as_str()))
    }

    /// Number of selections
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

/// Hosts entries for every selected service
///
/// Unknown services/profiles are logged and skipped, as are domains without
/// an address in the selected profile.
pub fn resolve_entries(catalog: &HostsCatalog, selections: &UserSelections) -> Vec<(IpAddr, String)> {
    let mut entries = Vec::new();
    for (service, profile) in selections.iter() {
        match catalog.entries_for(service, profile) {
            Ok(found) => entries.extend(found),
            Err(e) => warn!(service = %service, profile = %profile, error = %e, "Skipping selection"),
        }
    }
    entries
}
