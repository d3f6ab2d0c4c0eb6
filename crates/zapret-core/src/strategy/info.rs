//! Uniform strategy record built from BAT or JSON sources

use crate::error::{Error, Result};
use crate::preset::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a strategy was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum StrategySource {
    /// A `.bat` launcher script
    Bat(PathBuf),
    /// A `.json` strategy collection
    Json(PathBuf),
}

impl StrategySource {
    /// `bat` or `json`
    pub fn kind(&self) -> SourceKind {
        match self {
            StrategySource::Bat(_) => SourceKind::Bat,
            StrategySource::Json(_) => SourceKind::Json,
        }
    }
}

/// Source kind without the path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `.bat`
    Bat,
    /// `.json`
    Json,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Bat => "bat",
            SourceKind::Json => "json",
        })
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bat" => Ok(SourceKind::Bat),
            "json" => Ok(SourceKind::Json),
            _ => Err(Error::invalid_argument(s, "expected 'bat' or 'json'")),
        }
    }
}

/// Badge shown next to a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyLabel {
    /// Works for most users
    Recommended,
    /// Known good, not the first pick
    Stable,
    /// Tuned for game traffic
    Game,
    /// May not work
    Experimental,
    /// Can break other traffic
    Caution,
}

impl StrategyLabel {
    /// Sort priority, lower first
    pub fn priority(&self) -> u8 {
        match self {
            StrategyLabel::Recommended => 0,
            StrategyLabel::Stable => 1,
            StrategyLabel::Game => 2,
            StrategyLabel::Experimental => 3,
            StrategyLabel::Caution => 4,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyLabel::Recommended => "recommended",
            StrategyLabel::Stable => "stable",
            StrategyLabel::Game => "game",
            StrategyLabel::Experimental => "experimental",
            StrategyLabel::Caution => "caution",
        }
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recommended" | "rec" => Ok(StrategyLabel::Recommended),
            "stable" => Ok(StrategyLabel::Stable),
            "game" | "games" | "gaming" => Ok(StrategyLabel::Game),
            "experimental" | "exp" => Ok(StrategyLabel::Experimental),
            "caution" | "warning" => Ok(StrategyLabel::Caution),
            _ => Err(Error::invalid_argument(s, "unknown strategy label")),
        }
    }
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRange {
    /// First port
    pub start: u16,
    /// Last port
    pub end: u16,
}

impl PortRange {
    /// Whether the range contains a port
    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parse `80,443,50000-50100`; malformed items are skipped
pub fn parse_port_list(value: &str) -> Vec<PortRange> {
    value
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            let (start, end) = match item.split_once('-') {
                Some((a, b)) => (a.trim().parse().ok()?, b.trim().parse().ok()?),
                None => {
                    let p = item.parse().ok()?;
                    (p, p)
                }
            };
            (start <= end).then_some(PortRange { start, end })
        })
        .collect()
}

/// One selectable DPI-bypass strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// File it came from
    pub source: StrategySource,
    /// Badge
    pub label: Option<StrategyLabel>,
    /// Free text
    pub description: Option<String>,
    /// Author credit
    pub author: Option<String>,
    /// Protocols seen in filters
    pub protocols: BTreeSet<Protocol>,
    /// Port ranges seen in filters
    pub ports: BTreeSet<PortRange>,
    /// Desync techniques (`fake`, `multisplit`, `syndata`, ...)
    pub techniques: BTreeSet<String>,
    /// Raw `winws.exe` arguments
    pub args: Vec<String>,
}

impl StrategyInfo {
    /// Build a record and infer tags from the arguments
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: StrategySource, args: Vec<String>) -> Self {
        let mut info = Self {
            id: id.into(),
            name: name.into(),
            source,
            label: None,
            description: None,
            author: None,
            protocols: BTreeSet::new(),
            ports: BTreeSet::new(),
            techniques: BTreeSet::new(),
            args,
        };
        info.infer_tags();
        info
    }

    /// Whether any port range covers `port`
    pub fn covers_port(&self, port: u16) -> bool {
        self.ports.iter().any(|r| r.contains(port))
    }

    /// Recompute protocol, port and technique tags from `args`
    pub fn infer_tags(&mut self) {
        let mut protocols = BTreeSet::new();
        let mut ports = BTreeSet::new();
        let mut techniques = BTreeSet::new();

        for arg in &self.args {
            let arg = arg.trim_matches('"');
            let Some((key, value)) = arg.split_once('=') else {
                techniques.extend(flag_marker(arg).map(str::to_string));
                continue;
            };

            let protocol = match key {
                "--filter-tcp" | "--wf-tcp" => Some(Protocol::Tcp),
                "--filter-udp" | "--wf-udp" => Some(Protocol::Udp),
                _ => None,
            };
            if let Some(protocol) = protocol {
                protocols.insert(protocol);
                ports.extend(parse_port_list(value));
                continue;
            }

            match key {
                "--dpi-desync" => {
                    for technique in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        techniques.insert(technique.to_lowercase());
                    }
                }
                "--filter-l7" if value.contains("quic") => {
                    protocols.insert(Protocol::Udp);
                }
                _ => techniques.extend(flag_marker(key).map(str::to_string)),
            }
        }

        self.protocols = protocols;
        self.ports = ports;
        self.techniques = techniques;
    }

    /// Desync arguments of the first block matching `protocol`
    ///
    /// Blocks are split on `--new` and their filter, hostlist, ipset and
    /// `--wf-*` arguments are dropped. A block without a protocol filter
    /// is used only when no block names the protocol.
    pub fn desync_args(&self, protocol: Option<Protocol>) -> Vec<String> {
        let mut fallback = None;
        for block in self.args.split(|a| a == "--new") {
            let block_protocol = block.iter().find_map(|a| {
                let a = a.trim_matches('"');
                if a.starts_with("--filter-tcp=") {
                    Some(Protocol::Tcp)
                } else if a.starts_with("--filter-udp=") {
                    Some(Protocol::Udp)
                } else {
                    None
                }
            });
            let desync: Vec<String> = block
                .iter()
                .filter(|a| !is_selector_arg(a.trim_matches('"')))
                .cloned()
                .collect();
            if desync.is_empty() {
                continue;
            }
            match (protocol, block_protocol) {
                (None, _) => return desync,
                (Some(wanted), Some(found)) if wanted == found => return desync,
                (Some(_), None) => {
                    fallback.get_or_insert(desync);
                }
                _ => {}
            }
        }
        fallback.unwrap_or_default()
    }
}

fn is_selector_arg(arg: &str) -> bool {
    ["--filter-", "--hostlist", "--ipset", "--wf-"]
        .iter()
        .any(|prefix| arg.starts_with(prefix))
}

fn flag_marker(flag: &str) -> Option<&'static str> {
    match flag {
        "--syndata" => Some("syndata"),
        "--out-range" => Some("out-range"),
        "--send" => Some("send"),
        "--dpi-desync-autottl" => Some("autottl"),
        _ => None,
    }
}

/// Split a command line into arguments, honouring double quotes
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}
