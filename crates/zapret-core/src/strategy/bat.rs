//! Adapter for `.bat` launcher scripts
//!
//! Metadata comes from `REM KEY: value` (or `:: KEY: value`) lines, the
//! arguments from the `winws.exe` invocation with `^` continuations joined.

use super::info::{split_command_line, StrategyInfo, StrategySource};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

const EXECUTABLE: &str = "winws.exe";

/// Read a BAT file into a strategy record
pub fn load_bat(path: &Path) -> Result<StrategyInfo> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    parse_bat(&text, path)
}

/// Parse BAT text; `path` provides the id and the source
pub fn parse_bat(text: &str, path: &Path) -> Result<StrategyInfo> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let mut name = None;
    let mut description = None;
    let mut author = None;
    let mut label = None;

    for line in text.lines().map(str::trim) {
        let Some(comment) = strip_comment(line) else {
            continue;
        };
        let Some((key, value)) = comment.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_uppercase().as_str() {
            "NAME" => name = Some(value.to_string()),
            "DESCRIPTION" | "DESC" => description = Some(value.to_string()),
            "AUTHOR" => author = Some(value.to_string()),
            "LABEL" => match value.parse() {
                Ok(l) => label = Some(l),
                Err(_) => debug!(path = %path.display(), label = %value, "Unknown strategy label"),
            },
            _ => {}
        }
    }

    let args = winws_args(text)
        .ok_or_else(|| Error::strategy_source(path.display().to_string(), "no winws.exe invocation found"))?;

    let mut info = StrategyInfo::new(
        stem.to_lowercase(),
        name.unwrap_or_else(|| stem.clone()),
        StrategySource::Bat(path.to_path_buf()),
        args,
    );
    info.description = description;
    info.author = author;
    info.label = label;
    Ok(info)
}

fn strip_comment(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("::") {
        return Some(rest.trim());
    }
    let upper = line.get(..4)?.to_ascii_uppercase();
    if upper == "REM " {
        return Some(line[4..].trim());
    }
    None
}

/// Arguments after `winws.exe` in the first command that runs it
fn winws_args(text: &str) -> Option<Vec<String>> {
    let mut logical = String::new();
    for raw in text.lines() {
        let line = raw.trim_end();
        if let Some(body) = line.strip_suffix('^') {
            logical.push_str(body);
            logical.push(' ');
            continue;
        }
        logical.push_str(line);

        if strip_comment(logical.trim_start()).is_none() {
            let lower = logical.to_ascii_lowercase();
            if let Some(pos) = lower.find(EXECUTABLE) {
                let rest = &logical[pos + EXECUTABLE.len()..];
                let rest = rest.strip_prefix('"').unwrap_or(rest);
                return Some(split_command_line(rest));
            }
        }
        logical.clear();
    }
    None
}
