//! `hosts.ini` catalog parser
//!
//! ```text
//! [DNS]
//! Zapret DNS
//! Direct (no proxy)
//!
//! [YouTube]
//! youtube.com
//! 185.246.223.127
//! -
//! ```
//!
//! Each service section lists a domain followed by one IP line per DNS
//! profile, in `[DNS]` order.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

const DNS_SECTION: &str = "DNS";

/// Profile-name fragments that mark the "no proxy" column
const DIRECT_KEYWORDS: &[&str] = &[
    "direct",
    "no proxy",
    "non-proxy",
    "без прокси",
    "напрямую",
    "оригинал",
];

/// A domain with one optional IP per DNS profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    /// Domain name, lowercased
    pub domain: String,
    /// IP per profile; `None` when the profile has no address
    pub ips: Vec<Option<IpAddr>>,
}

/// A service section of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Section name
    pub name: String,
    /// Domains in file order
    pub domains: Vec<DomainEntry>,
}

impl Service {
    /// Whether any domain has an address in the given profile
    pub fn available_in(&self, profile: usize) -> bool {
        self.domains
            .iter()
            .any(|d| d.ips.get(profile).copied().flatten().is_some())
    }
}

/// Parsed `hosts.ini`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostsCatalog {
    profiles: Vec<String>,
    services: Vec<Service>,
    meta: BTreeMap<String, Vec<String>>,
}

impl HostsCatalog {
    /// Load and parse a catalog file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let catalog = Self::parse(text.trim_start_matches('\u{feff}'))?;
        info!(
            path = %path.display(),
            services = catalog.services.len(),
            profiles = catalog.profiles.len(),
            "Loaded hosts catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog text
    pub fn parse(text: &str) -> Result<Self> {
        let mut catalog = Self::default();
        let mut section: Option<String> = None;
        let mut pending: Vec<(usize, String)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                catalog.finish_section(section.take(), std::mem::take(&mut pending))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::catalog(line_no, "empty section name"));
                }
                section = Some(name.to_string());
                continue;
            }

            if section.is_none() {
                return Err(Error::catalog(line_no, "line outside of any section"));
            }
            pending.push((line_no, line.to_string()));
        }
        catalog.finish_section(section, pending)?;

        if catalog.profiles.is_empty() && !catalog.services.is_empty() {
            return Err(Error::catalog(1, "missing [DNS] section"));
        }
        Ok(catalog)
    }

    fn finish_section(&mut self, name: Option<String>, lines: Vec<(usize, String)>) -> Result<()> {
        let Some(name) = name else {
            return Ok(());
        };

        if name.eq_ignore_ascii_case(DNS_SECTION) {
            self.profiles = lines.into_iter().map(|(_, l)| l).collect();
            return Ok(());
        }
        if is_meta_section(&name) {
            self.meta.insert(name, lines.into_iter().map(|(_, l)| l).collect());
            return Ok(());
        }
        if self.profiles.is_empty() {
            let line = lines.first().map_or(1, |(n, _)| *n);
            return Err(Error::catalog(line, format!("service [{name}] appears before [DNS]")));
        }

        let width = self.profiles.len();
        let mut domains = Vec::new();
        let mut iter = lines.into_iter();

        while let Some((line_no, domain)) = iter.next() {
            if domain.parse::<IpAddr>().is_ok() {
                return Err(Error::catalog(line_no, format!("expected a domain in [{name}], found IP")));
            }
            let mut ips = Vec::with_capacity(width);
            for _ in 0..width {
                let Some((ip_line, value)) = iter.next() else {
                    return Err(Error::catalog(
                        line_no,
                        format!("domain '{domain}' in [{name}] has fewer than {width} IP lines"),
                    ));
                };
                ips.push(parse_ip(&value).map_err(|msg| Error::catalog(ip_line, msg))?);
            }
            domains.push(DomainEntry {
                domain: domain.to_lowercase(),
                ips,
            });
        }

        if let Some(existing) = self.services.iter_mut().find(|s| s.name.eq_ignore_ascii_case(&name)) {
            existing.domains.extend(domains);
        } else {
            self.services.push(Service { name, domains });
        }
        Ok(())
    }

    /// DNS profile names in column order
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Service sections, meta sections excluded
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Service names
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a service by name (case-insensitive)
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Reserved `__name__` sections
    pub fn meta(&self, name: &str) -> Option<&[String]> {
        self.meta.get(name).map(Vec::as_slice)
    }

    /// Column index of a profile name (case-insensitive)
    pub fn profile_index(&self, profile: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.eq_ignore_ascii_case(profile))
    }

    /// IP of a domain in a service for a profile
    pub fn ip_for(&self, service: &str, domain: &str, profile: &str) -> Option<IpAddr> {
        let column = self.profile_index(profile)?;
        self.service(service)?
            .domains
            .iter()
            .find(|d| d.domain.eq_ignore_ascii_case(domain))
            .and_then(|d| d.ips.get(column).copied().flatten())
    }

    /// `(ip, domain)` pairs of a service for a profile; domains without an
    /// address in that profile are skipped
    pub fn entries_for(&self, service: &str, profile: &str) -> Result<Vec<(IpAddr, String)>> {
        let svc = self.service(service).ok_or_else(|| Error::UnknownEntry {
            kind: "service",
            name: service.to_string(),
        })?;
        let column = self.profile_index(profile).ok_or_else(|| Error::UnknownEntry {
            kind: "DNS profile",
            name: profile.to_string(),
        })?;

        Ok(svc
            .domains
            .iter()
            .filter_map(|d| d.ips.get(column).copied().flatten().map(|ip| (ip, d.domain.clone())))
            .collect())
    }

    /// Every domain in every service
    pub fn all_domains(&self) -> HashSet<String> {
        self.services
            .iter()
            .flat_map(|s| s.domains.iter().map(|d| d.domain.clone()))
            .collect()
    }

    /// Column of the "direct" (unproxied) profile
    ///
    /// Name keywords win. Otherwise the column with strictly the most
    /// distinct IPs across all domains (at least two) is chosen, since proxy
    /// profiles point many domains at a handful of addresses.
    pub fn direct_profile(&self) -> Option<usize> {
        if let Some(idx) = self.profiles.iter().position(|p| {
            let p = p.to_lowercase();
            DIRECT_KEYWORDS.iter().any(|k| p.contains(k))
        }) {
            return Some(idx);
        }

        let counts: Vec<usize> = (0..self.profiles.len())
            .map(|col| {
                self.services
                    .iter()
                    .flat_map(|s| &s.domains)
                    .filter_map(|d| d.ips.get(col).copied().flatten())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .collect();

        let (best, &max) = counts.iter().enumerate().max_by_key(|(_, c)| **c)?;
        if max < 2 || counts.iter().filter(|&&c| c == max).count() > 1 {
            debug!(?counts, "No distinct direct profile column");
            return None;
        }
        Some(best)
    }
}

/// `__name__` sections hold catalog metadata, not services
pub fn is_meta_section(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn parse_ip(value: &str) -> std::result::Result<Option<IpAddr>, String> {
    let value = value.trim();
    if value.is_empty() || value == "-" || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse::<IpAddr>()
        .map(Some)
        .map_err(|_| format!("invalid IP address '{value}'"))
}

/// Catalog cache invalidated by file modification time
#[derive(Debug)]
pub struct CatalogCache {
    path: PathBuf,
    state: Mutex<Option<(SystemTime, Arc<HostsCatalog>)>>,
}

impl CatalogCache {
    /// Cache for a catalog path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    /// Catalog path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current catalog, re-parsed only when the file mtime changed
    pub fn get(&self) -> Result<Arc<HostsCatalog>> {
        let modified = fs::metadata(&self.path)?.modified()?;
        let mut state = self.state.lock();

        if let Some((cached_at, catalog)) = state.as_ref() {
            if *cached_at == modified {
                return Ok(Arc::clone(catalog));
            }
            debug!(path = %self.path.display(), "Hosts catalog changed, reloading");
        }

        match HostsCatalog::load(&self.path) {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                *state = Some((modified, Arc::clone(&catalog)));
                Ok(catalog)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to reload hosts catalog");
                *state = None;
                Err(e)
            }
        }
    }

    /// Drop the cached catalog
    pub fn invalidate(&self) {
        *self.state.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
[DNS]
Zapret DNS
XBOX DNS
Direct (no proxy)

[__ipv6_status__]
disabled

[YouTube]
youtube.com
185.246.223.127
176.99.11.77
-
www.youtube.com
185.246.223.127
176.99.11.77
none

[ChatGPT]
chatgpt.com
185.246.223.127
176.99.11.77
104.18.32.47
";

    #[test]
    fn test_parse_profiles_and_services() {
        let catalog = HostsCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.profiles().len(), 3);
        assert_eq!(catalog.service_names(), vec!["YouTube", "ChatGPT"]);
        assert_eq!(catalog.meta("__ipv6_status__"), Some(&["disabled".to_string()][..]));
    }

    #[test]
    fn test_lookup() {
        let catalog = HostsCatalog::parse(CATALOG).unwrap();
        assert_eq!(
            catalog.ip_for("youtube", "YOUTUBE.com", "zapret dns"),
            Some("185.246.223.127".parse().unwrap())
        );
        assert_eq!(catalog.ip_for("YouTube", "youtube.com", "Direct (no proxy)"), None);

        let entries = catalog.entries_for("YouTube", "XBOX DNS").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(catalog.entries_for("YouTube", "Direct (no proxy)").unwrap().is_empty());
        assert!(catalog.entries_for("Netflix", "XBOX DNS").is_err());
        assert!(!catalog.service("YouTube").unwrap().available_in(2));
    }

    #[test]
    fn test_duplicate_sections_merge_ignoring_case() {
        let text = format!("{CATALOG}\n[youtube]\nyoutu.be\n1.1.1.1\n2.2.2.2\n-\n");
        let catalog = HostsCatalog::parse(&text).unwrap();
        assert_eq!(catalog.service_names(), vec!["YouTube", "ChatGPT"]);

        let youtube = catalog.service("YOUTUBE").unwrap();
        assert_eq!(youtube.domains.len(), 3);
        assert_eq!(catalog.ip_for("YouTube", "youtu.be", "XBOX DNS"), Some("2.2.2.2".parse().unwrap()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(HostsCatalog::parse("[YouTube]\nyoutube.com\n1.1.1.1\n").is_err());
        assert!(HostsCatalog::parse("[DNS]\nA\nB\n[S]\nexample.com\n1.1.1.1\n").is_err());
        assert!(HostsCatalog::parse("[DNS]\nA\n[S]\nexample.com\nnot-an-ip\n").is_err());
        assert!(HostsCatalog::parse("stray line\n").is_err());
    }

    #[test]
    fn test_cache_reloads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.ini");
        fs::write(&path, CATALOG).unwrap();

        let cache = CatalogCache::new(&path);
        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate();
        let third = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }
}
