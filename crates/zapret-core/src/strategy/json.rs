//! Adapter for `.json` strategy collections

use super::info::{split_command_line, StrategyInfo, StrategySource};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    List { strategies: Vec<Entry> },
    Keyed(BTreeMap<String, Entry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Args {
    List(Vec<String>),
    Line(String),
}

impl Args {
    fn into_vec(self) -> Vec<String> {
        match self {
            Args::List(v) => v,
            Args::Line(s) => split_command_line(&s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    args: Args,
}

/// Read a JSON file into strategy records
pub fn load_json(path: &Path) -> Result<Vec<StrategyInfo>> {
    let text = std::fs::read_to_string(path)?;
    parse_json(&text, path)
}

/// Parse either `{"strategies": [...]}` or an object keyed by id
pub fn parse_json(text: &str, path: &Path) -> Result<Vec<StrategyInfo>> {
    let doc: Document = serde_json::from_str(text)
        .map_err(|e| Error::strategy_source(path.display().to_string(), e.to_string()))?;

    let entries: Vec<(Option<String>, Entry)> = match doc {
        Document::List { strategies } => strategies.into_iter().map(|e| (None, e)).collect(),
        Document::Keyed(map) => map.into_iter().map(|(k, e)| (Some(k), e)).collect(),
    };

    let mut out = Vec::with_capacity(entries.len());
    for (index, (key, entry)) in entries.into_iter().enumerate() {
        let Some(id) = entry.id.clone().or(key) else {
            return Err(Error::strategy_source(
                path.display().to_string(),
                format!("strategy #{} has no id", index + 1),
            ));
        };
        let name = entry.name.clone().unwrap_or_else(|| id.clone());

        let mut info = StrategyInfo::new(id, name, StrategySource::Json(path.to_path_buf()), entry.args.into_vec());
        info.description = entry.description;
        info.author = entry.author;
        info.label = entry.label.as_deref().and_then(|l| match l.parse() {
            Ok(label) => Some(label),
            Err(_) => {
                debug!(path = %path.display(), label = %l, "Unknown strategy label");
                None
            }
        });
        out.push(info);
    }
    Ok(out)
}
