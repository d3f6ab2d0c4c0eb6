//! Preset text format
//!
//! A preset is a flat text file consumed by `winws.exe` through `@file`:
//!
//! ```text
//! # Preset: Default
//! # Created: 2024-05-01 10:00:00
//! # Description: YouTube and Discord
//!
//! --wf-tcp=80,443
//! --wf-udp=443
//!
//! --filter-tcp=443
//! --hostlist=lists/youtube.txt
//! --dpi-desync=fake,split2
//!
//! --new
//!
//! --filter-udp=443
//! --hostlist=lists/youtube.txt
//! --dpi-desync=fake
//! ```
//!
//! Leading `#` lines form the header, lines before the first
//! `--filter-tcp`/`--filter-udp` are base arguments and the rest is a
//! sequence of category blocks separated by `--new`.

mod args;
mod store;

pub use args::{
    parse_out_range, parse_send, parse_syndata, AutoTtl, OutRange, OutRangeMode, SendSettings,
    SyndataSettings,
};
pub use store::{validate_name, PresetEntry, PresetStore};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Block separator line
pub const BLOCK_SEPARATOR: &str = "--new";

/// Timestamp format used in `Created`/`Modified` headers
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HOSTLIST_PREFIX: &str = "--hostlist=";
const IPSET_PREFIX: &str = "--ipset=";
const HOSTLIST_DOMAINS_PREFIX: &str = "--hostlist-domains=";

const CATEGORY_PREFIXES: &[&str] = &["ipset-", "list-", "hostlist-"];
const CATEGORY_SUFFIXES: &[&str] = &[
    "-hosts", "_hosts", "-ipset", "_ipset", "-list", "_list", "-domains", "_domains",
];

/// Transport protocol of a category block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// `--filter-tcp`
    Tcp,
    /// `--filter-udp`
    Udp,
}

impl Protocol {
    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Filter flag that opens a block for this protocol
    pub fn filter_flag(&self) -> &'static str {
        match self {
            Protocol::Tcp => "--filter-tcp",
            Protocol::Udp => "--filter-udp",
        }
    }

    fn from_filter_arg(arg: &str) -> Option<(Self, &str)> {
        if let Some(ports) = arg.strip_prefix("--filter-tcp=") {
            Some((Protocol::Tcp, ports))
        } else if let Some(ports) = arg.strip_prefix("--filter-udp=") {
            Some((Protocol::Udp, ports))
        } else {
            None
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(Error::invalid_argument(s, "expected 'tcp' or 'udp'")),
        }
    }
}

/// `# Key: value` header of a preset file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetHeader {
    /// `Preset` - display name
    pub name: String,
    /// `ActivePreset` - only written into the active mirror file
    pub active_preset: Option<String>,
    /// `Created`
    pub created: Option<String>,
    /// `Modified`
    pub modified: Option<String>,
    /// `IconColor`
    pub icon_color: Option<String>,
    /// `Description`
    pub description: Option<String>,
    /// Unrecognized `Key: value` pairs, kept in order
    pub extra: Vec<(String, String)>,
    /// Free-form header comment lines
    pub comments: Vec<String>,
}

impl PresetHeader {
    /// Header with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set `Modified` to now, and `Created` too when it is missing
    pub fn touch(&mut self) {
        let now = now_timestamp();
        if self.created.is_none() {
            self.created = Some(now.clone());
        }
        self.modified = Some(now);
    }

    fn apply_line(&mut self, comment: &str) {
        let Some((key, value)) = comment.split_once(':') else {
            self.comments.push(comment.to_string());
            return;
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.comments.push(comment.to_string());
            return;
        }
        let value = value.trim().to_string();

        match key.to_ascii_lowercase().as_str() {
            "preset" => self.name = value,
            "activepreset" => self.active_preset = Some(value),
            "created" => self.created = Some(value),
            "modified" => self.modified = Some(value),
            "iconcolor" => self.icon_color = Some(value),
            "description" => self.description = Some(value),
            _ => self.extra.push((key.to_string(), value)),
        }
    }

    fn render(&self, out: &mut String) {
        push_header(out, "Preset", Some(&self.name));
        push_header(out, "ActivePreset", self.active_preset.as_deref());
        push_header(out, "Created", self.created.as_deref());
        push_header(out, "Modified", self.modified.as_deref());
        push_header(out, "IconColor", self.icon_color.as_deref());
        push_header(out, "Description", self.description.as_deref());
        for (key, value) in &self.extra {
            push_header(out, key, Some(value));
        }
        for comment in &self.comments {
            out.push_str("# ");
            out.push_str(comment);
            out.push('\n');
        }
    }
}

fn push_header(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str("# ");
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&single_line(value));
        out.push('\n');
    }
}

/// Collapse line breaks so a header value stays on its own `#` line
pub fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Current local time in the header timestamp format
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One `--new` delimited block of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBlock {
    /// Category name derived from the hostlist/ipset file
    pub category: String,
    /// Protocol from `--filter-tcp`/`--filter-udp`
    pub protocol: Protocol,
    /// Port list as written, e.g. `80,443` or `50000-50100`
    pub ports: String,
    /// `--hostlist*`, `--ipset*` and other `--filter-*` arguments
    pub filter_args: Vec<String>,
    /// DPI desync arguments
    pub strategy_args: Vec<String>,
}

impl CategoryBlock {
    /// Create a block for a hostlist file
    pub fn new(protocol: Protocol, ports: impl Into<String>, hostlist: &str) -> Self {
        let filter_args = vec![format!("{HOSTLIST_PREFIX}{hostlist}")];
        let ports = ports.into();
        let category = derive_category(&filter_args)
            .unwrap_or_else(|| fallback_category(protocol, &ports));
        Self {
            category,
            protocol,
            ports,
            filter_args,
            strategy_args: Vec::new(),
        }
    }

    /// Replace the strategy arguments, keeping filters untouched
    pub fn set_strategy<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy_args = args
            .into_iter()
            .flat_map(|a| split_arg_line(a.as_ref()))
            .collect();
    }

    /// Strategy arguments joined on one line
    pub fn strategy_line(&self) -> String {
        self.strategy_args.join(" ")
    }

    /// Parsed `--out-range=` argument, if present
    pub fn out_range(&self) -> Result<Option<OutRange>> {
        self.find_arg("--out-range=").map(parse_out_range).transpose()
    }

    /// Parsed `--syndata` argument, if present
    pub fn syndata(&self) -> Result<Option<SyndataSettings>> {
        self.strategy_args
            .iter()
            .find(|a| *a == "--syndata" || a.starts_with("--syndata="))
            .map(|a| parse_syndata(a))
            .transpose()
    }

    /// Parsed `--send` argument, if present
    pub fn send(&self) -> Result<Option<SendSettings>> {
        self.strategy_args
            .iter()
            .find(|a| *a == "--send" || a.starts_with("--send="))
            .map(|a| parse_send(a))
            .transpose()
    }

    fn find_arg(&self, prefix: &str) -> Option<&str> {
        self.strategy_args
            .iter()
            .find(|a| a.starts_with(prefix))
            .map(String::as_str)
    }

    fn from_lines(lines: Vec<(usize, String)>, start_line: usize) -> Result<Self> {
        let mut protocol = None;
        let mut filter_args = Vec::new();
        let mut strategy_args = Vec::new();

        for (_, arg) in lines {
            if protocol.is_none() {
                if let Some((proto, ports)) = Protocol::from_filter_arg(&arg) {
                    protocol = Some((proto, ports.to_string()));
                    continue;
                }
            }
            if is_filter_arg(&arg) {
                filter_args.push(arg);
            } else {
                strategy_args.push(arg);
            }
        }

        let (protocol, ports) = protocol.ok_or_else(|| {
            Error::preset_at("block has no --filter-tcp or --filter-udp argument", start_line)
        })?;
        let category =
            derive_category(&filter_args).unwrap_or_else(|| fallback_category(protocol, &ports));

        Ok(Self {
            category,
            protocol,
            ports,
            filter_args,
            strategy_args,
        })
    }

    fn render(&self, out: &mut String) {
        out.push_str(self.protocol.filter_flag());
        out.push('=');
        out.push_str(&self.ports);
        out.push('\n');
        for arg in self.filter_args.iter().chain(&self.strategy_args) {
            out.push_str(arg);
            out.push('\n');
        }
    }
}

/// A parsed preset file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Comment header
    pub header: PresetHeader,
    /// Arguments applied before the first block (`--wf-tcp`, `--wf-udp`, ...)
    pub base_args: Vec<String>,
    /// Category blocks in file order
    pub blocks: Vec<CategoryBlock>,
}

impl Preset {
    /// Empty preset with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            header: PresetHeader::named(name),
            ..Default::default()
        }
    }

    /// Parse preset text
    pub fn parse(text: &str) -> Result<Self> {
        let mut header = PresetHeader::default();
        let mut lines = text.lines().enumerate().peekable();

        // Header: leading comment lines
        while let Some((_, raw)) = lines.peek() {
            let line = raw.trim();
            if line.is_empty() && header == PresetHeader::default() {
                lines.next();
                continue;
            }
            let Some(comment) = line.strip_prefix('#') else {
                break;
            };
            header.apply_line(comment.trim());
            lines.next();
        }

        let mut base_args = Vec::new();
        let mut blocks = Vec::new();
        let mut current: Option<(usize, Vec<(usize, String)>)> = None;

        for (idx, raw) in lines {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line == BLOCK_SEPARATOR {
                if let Some((start, block_lines)) = current.take() {
                    if !block_lines.is_empty() {
                        blocks.push(CategoryBlock::from_lines(block_lines, start)?);
                    }
                }
                current = Some((line_no, Vec::new()));
                continue;
            }

            for arg in split_arg_line(line) {
                match current.as_mut() {
                    Some((_, block_lines)) => block_lines.push((line_no, arg)),
                    None if Protocol::from_filter_arg(&arg).is_some() => {
                        current = Some((line_no, vec![(line_no, arg)]));
                    }
                    None => base_args.push(arg),
                }
            }
        }

        if let Some((start, block_lines)) = current {
            if !block_lines.is_empty() {
                blocks.push(CategoryBlock::from_lines(block_lines, start)?);
            }
        }

        Ok(Self {
            header,
            base_args,
            blocks,
        })
    }

    /// Regenerate preset text from parsed fields
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.header.render(&mut out);
        out.push('\n');

        if !self.base_args.is_empty() {
            for arg in &self.base_args {
                out.push_str(arg);
                out.push('\n');
            }
            out.push('\n');
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(BLOCK_SEPARATOR);
                out.push_str("\n\n");
            }
            block.render(&mut out);
        }

        out
    }

    /// Preset display name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Distinct category names in file order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for block in &self.blocks {
            if !seen.contains(&block.category.as_str()) {
                seen.push(block.category.as_str());
            }
        }
        seen
    }

    /// First block for a category, optionally restricted to one protocol
    pub fn block(&self, category: &str, protocol: Option<Protocol>) -> Option<&CategoryBlock> {
        self.blocks
            .iter()
            .find(|b| b.category.eq_ignore_ascii_case(category) && protocol.map_or(true, |p| b.protocol == p))
    }

    /// Mutable access to the first block for a category
    pub fn block_mut(
        &mut self,
        category: &str,
        protocol: Option<Protocol>,
    ) -> Option<&mut CategoryBlock> {
        self.blocks
            .iter_mut()
            .find(|b| b.category.eq_ignore_ascii_case(category) && protocol.map_or(true, |p| b.protocol == p))
    }

    /// Replace strategy arguments of every block of a category
    ///
    /// Returns the number of blocks changed.
    pub fn apply_strategy(
        &mut self,
        category: &str,
        protocol: Option<Protocol>,
        args: &[String],
    ) -> Result<usize> {
        let mut changed = 0;
        for block in self.blocks.iter_mut().filter(|b| {
            b.category.eq_ignore_ascii_case(category) && protocol.map_or(true, |p| b.protocol == p)
        }) {
            block.set_strategy(args);
            changed += 1;
        }

        if changed == 0 {
            return Err(Error::CategoryNotFound {
                preset: self.header.name.clone(),
                category: category.to_string(),
            });
        }
        self.header.touch();
        Ok(changed)
    }

    /// Flatten into a `winws.exe` argument vector
    pub fn to_command_args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                args.push(BLOCK_SEPARATOR.to_string());
            }
            args.push(format!("{}={}", block.protocol.filter_flag(), block.ports));
            args.extend(block.filter_args.iter().cloned());
            args.extend(block.strategy_args.iter().cloned());
        }
        args
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_filter_arg(arg: &str) -> bool {
    arg.starts_with("--filter-") || arg.starts_with("--hostlist") || arg.starts_with("--ipset")
}

/// Split a line holding several `--arg` tokens; a token not starting with
/// `--` belongs to the previous one (unquoted path with spaces).
fn split_arg_line(line: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    for token in line.split_whitespace() {
        match args.last_mut() {
            Some(last) if !token.starts_with("--") => {
                last.push(' ');
                last.push_str(token);
            }
            _ => args.push(token.to_string()),
        }
    }
    args
}

/// Category name from the first `--hostlist=`/`--ipset=` filename
pub fn derive_category(filter_args: &[String]) -> Option<String> {
    let file_arg = filter_args
        .iter()
        .find_map(|a| a.strip_prefix(HOSTLIST_PREFIX))
        .or_else(|| filter_args.iter().find_map(|a| a.strip_prefix(IPSET_PREFIX)));

    if let Some(path) = file_arg {
        let name = category_from_filename(path);
        if !name.is_empty() {
            return Some(name);
        }
    }

    filter_args
        .iter()
        .find_map(|a| a.strip_prefix(HOSTLIST_DOMAINS_PREFIX))
        .and_then(|domains| domains.split(',').next())
        .and_then(category_from_domain)
}

fn category_from_filename(path: &str) -> String {
    let path = path.trim().trim_matches('"');
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };

    let mut name = stem.to_lowercase();
    for prefix in CATEGORY_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.to_string();
            break;
        }
    }
    for suffix in CATEGORY_SUFFIXES {
        if let Some(rest) = name.strip_suffix(suffix) {
            name = rest.to_string();
            break;
        }
    }
    name
}

fn category_from_domain(domain: &str) -> Option<String> {
    let labels: Vec<&str> = domain.trim().split('.').filter(|l| !l.is_empty()).collect();
    let label = match labels.len() {
        0 => return None,
        1 => labels[0],
        n => labels[n - 2],
    };
    Some(label.to_lowercase())
}

fn fallback_category(protocol: Protocol, ports: &str) -> String {
    format!("{}-{}", protocol, ports.replace(',', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Preset: Default
# Created: 2024-05-01 10:00:00
# IconColor: #60cdff
# Description: YouTube and Discord

--wf-tcp=80,443
--wf-udp=443,50000-50100

--filter-tcp=443
--hostlist=lists/youtube.txt
--dpi-desync=fake,split2
--dpi-desync-repeats=6

--new

--filter-udp=50000-50100
--ipset=lists/ipset-discord.txt
--dpi-desync=fake
--dpi-desync-any-protocol
";

    #[test]
    fn test_parse_header() {
        let preset = Preset::parse(SAMPLE).unwrap();
        assert_eq!(preset.name(), "Default");
        assert_eq!(preset.header.created.as_deref(), Some("2024-05-01 10:00:00"));
        assert_eq!(preset.header.icon_color.as_deref(), Some("#60cdff"));
        assert_eq!(preset.header.description.as_deref(), Some("YouTube and Discord"));
        assert!(preset.header.modified.is_none());
    }

    #[test]
    fn test_parse_base_and_blocks() {
        let preset = Preset::parse(SAMPLE).unwrap();
        assert_eq!(preset.base_args, vec!["--wf-tcp=80,443", "--wf-udp=443,50000-50100"]);
        assert_eq!(preset.blocks.len(), 2);

        let yt = &preset.blocks[0];
        assert_eq!(yt.category, "youtube");
        assert_eq!(yt.protocol, Protocol::Tcp);
        assert_eq!(yt.ports, "443");
        assert_eq!(yt.strategy_args, vec!["--dpi-desync=fake,split2", "--dpi-desync-repeats=6"]);

        let discord = &preset.blocks[1];
        assert_eq!(discord.category, "discord");
        assert_eq!(discord.protocol, Protocol::Udp);
        assert_eq!(discord.filter_args, vec!["--ipset=lists/ipset-discord.txt"]);
    }

    #[test]
    fn test_parse_crlf_and_inline_args() {
        let text = "# Preset: Inline\r\n\r\n--filter-tcp=80 --hostlist=list-general.txt\r\n--dpi-desync=split --dpi-desync-split-pos=1\r\n";
        let preset = Preset::parse(text).unwrap();
        assert_eq!(preset.blocks.len(), 1);
        assert_eq!(preset.blocks[0].category, "general");
        assert_eq!(preset.blocks[0].strategy_args.len(), 2);
    }

    #[test]
    fn test_block_without_filter_is_error() {
        let text = "--wf-tcp=443\n--filter-tcp=443\n--dpi-desync=fake\n--new\n--dpi-desync=split\n";
        let err = Preset::parse(text).unwrap_err();
        match err {
            Error::Preset { line, .. } => assert_eq!(line, Some(4)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_category_derivation() {
        assert_eq!(category_from_filename("lists/youtube.txt"), "youtube");
        assert_eq!(category_from_filename("C:\\zapret\\lists\\ipset-cloudflare.txt"), "cloudflare");
        assert_eq!(category_from_filename("\"discord_hosts.txt\""), "discord");
        assert_eq!(category_from_filename("Games-list.lst"), "games");

        let args = vec!["--hostlist-domains=discord.com,discord.gg".to_string()];
        assert_eq!(derive_category(&args).as_deref(), Some("discord"));

        let block = CategoryBlock::from_lines(vec![(1, "--filter-udp=443,50000".into())], 1).unwrap();
        assert_eq!(block.category, "udp-443_50000");
    }

    #[test]
    fn test_header_value_with_newlines_stays_on_one_line() {
        let mut preset = Preset::parse(SAMPLE).unwrap();
        preset.header.description = Some("first line\r\nsecond line\n".into());
        preset.header.icon_color = Some("#fff\n--dpi-desync=fake".into());

        let rendered = preset.render();
        let description: Vec<_> = rendered.lines().filter(|l| l.starts_with("# Description:")).collect();
        assert_eq!(description, ["# Description: first line second line"]);
        assert!(!rendered.lines().any(|l| l == "--dpi-desync=fake"));

        let reparsed = Preset::parse(&rendered).unwrap();
        assert_eq!(reparsed.header.description.as_deref(), Some("first line second line"));
        assert_eq!(reparsed.header.icon_color.as_deref(), Some("#fff --dpi-desync=fake"));
        assert_eq!(reparsed.blocks, preset.blocks);
    }

    #[test]
    fn test_render_roundtrip_blocks() {
        let preset = Preset::parse(SAMPLE).unwrap();
        let reparsed = Preset::parse(&preset.render()).unwrap();
        assert_eq!(preset, reparsed);
    }

    #[test]
    fn test_apply_strategy() {
        let mut preset = Preset::parse(SAMPLE).unwrap();
        let changed = preset
            .apply_strategy("youtube", Some(Protocol::Tcp), &["--dpi-desync=multisplit --dpi-desync-split-pos=2".to_string()])
            .unwrap();
        assert_eq!(changed, 1);

        let block = preset.block("youtube", None).unwrap();
        assert_eq!(block.strategy_args, vec!["--dpi-desync=multisplit", "--dpi-desync-split-pos=2"]);
        assert_eq!(block.filter_args, vec!["--hostlist=lists/youtube.txt"]);
        assert!(preset.header.modified.is_some());

        assert!(preset.apply_strategy("telegram", None, &[]).is_err());
    }

    #[test]
    fn test_block_fragments() {
        let text = "--filter-tcp=443\n--hostlist=youtube.txt\n--out-range=-n8\n--syndata=blob=tls_google\n--send=repeats=2\n";
        let preset = Preset::parse(text).unwrap();
        let block = &preset.blocks[0];
        assert_eq!(block.out_range().unwrap().unwrap().value, 8);
        assert_eq!(block.syndata().unwrap().unwrap().blob.as_deref(), Some("tls_google"));
        assert_eq!(block.send().unwrap().unwrap().repeats, Some(2));
    }

    #[test]
    fn test_command_args() {
        let preset = Preset::parse(SAMPLE).unwrap();
        let args = preset.to_command_args();
        assert_eq!(args[0], "--wf-tcp=80,443");
        assert_eq!(args[2], "--filter-tcp=443");
        assert!(args.contains(&BLOCK_SEPARATOR.to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--dpi-desync-any-protocol"));
    }
}
