//! Strategy list filtering and ordering

use super::info::{SourceKind, StrategyInfo, StrategyLabel};
use crate::error::{Error, Result};
use crate::preset::Protocol;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Column to sort strategies by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Display name, case-insensitive
    #[default]
    Name,
    /// Label priority, unlabelled last
    Label,
    /// Source kind, then file path
    Source,
    /// Identifier
    Id,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortKey::Name => "name",
            SortKey::Label => "label",
            SortKey::Source => "source",
            SortKey::Id => "id",
        })
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "label" => Ok(SortKey::Label),
            "source" => Ok(SortKey::Source),
            "id" => Ok(SortKey::Id),
            _ => Err(Error::invalid_argument(s, "expected name, label, source or id")),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// A to Z
    #[default]
    Ascending,
    /// Z to A
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        })
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(Error::invalid_argument(s, "expected asc or desc")),
        }
    }
}

/// Criteria a strategy must meet to be listed; empty fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyFilter {
    /// Case-insensitive substring of name, id, description or author
    pub query: Option<String>,
    /// Must filter this protocol
    pub protocol: Option<Protocol>,
    /// Must cover this port
    pub port: Option<u16>,
    /// Must use this desync technique
    pub technique: Option<String>,
    /// Must carry this label
    pub label: Option<StrategyLabel>,
    /// Must come from this kind of file
    pub source: Option<SourceKind>,
}

impl StrategyFilter {
    /// Whether `info` passes every set criterion
    pub fn matches(&self, info: &StrategyInfo) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            let hit = [Some(&info.name), Some(&info.id), info.description.as_ref(), info.author.as_ref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }
        if self.protocol.is_some_and(|p| !info.protocols.contains(&p)) {
            return false;
        }
        if self.port.is_some_and(|p| !info.covers_port(p)) {
            return false;
        }
        if let Some(technique) = &self.technique {
            if !info.techniques.contains(&technique.to_lowercase()) {
                return false;
            }
        }
        if self.label.is_some() && info.label != self.label {
            return false;
        }
        if self.source.is_some_and(|k| info.source.kind() != k) {
            return false;
        }
        true
    }
}

fn compare_by(key: SortKey, a: &StrategyInfo, b: &StrategyInfo) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Id => a.id.cmp(&b.id),
        SortKey::Label => {
            let rank = |s: &StrategyInfo| s.label.map_or(u8::MAX, |l| l.priority());
            rank(a).cmp(&rank(b))
        }
        SortKey::Source => {
            let path = |s: &StrategyInfo| match &s.source {
                super::StrategySource::Bat(p) | super::StrategySource::Json(p) => p.clone(),
            };
            a.source.kind().cmp(&b.source.kind()).then_with(|| path(a).cmp(&path(b)))
        }
    }
}

/// Filter `items` and sort them
///
/// The direction applies to the primary key only; ties are broken by name and
/// then id in ascending order, so the result is deterministic.
pub fn filter_and_sort<'a>(
    items: &'a [StrategyInfo],
    filter: &StrategyFilter,
    key: SortKey,
    order: SortOrder,
) -> Vec<&'a StrategyInfo> {
    let mut out: Vec<&StrategyInfo> = items.iter().filter(|s| filter.matches(s)).collect();
    out.sort_by(|a, b| {
        let primary = compare_by(key, a, b);
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary
            .then_with(|| compare_by(SortKey::Name, a, b))
            .then_with(|| compare_by(SortKey::Id, a, b))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategySource;
    use std::path::PathBuf;

    fn strategy(id: &str, name: &str, label: Option<StrategyLabel>, bat: bool, args: &[&str]) -> StrategyInfo {
        let source = if bat {
            StrategySource::Bat(PathBuf::from(format!("{id}.bat")))
        } else {
            StrategySource::Json(PathBuf::from("all.json"))
        };
        let mut s = StrategyInfo::new(id, name, source, args.iter().map(|a| a.to_string()).collect());
        s.label = label;
        s
    }

    fn sample() -> Vec<StrategyInfo> {
        vec![
            strategy("c", "Discord voice", Some(StrategyLabel::Game), false, &["--filter-udp=50000-50100", "--dpi-desync=fake"]),
            strategy("a", "general", None, true, &["--filter-tcp=443", "--dpi-desync=multisplit"]),
            strategy("b", "General", Some(StrategyLabel::Recommended), true, &["--filter-tcp=80,443", "--dpi-desync=fake,split2"]),
        ]
    }

    // ===== Filter Tests =====

    #[test]
    fn test_empty_filter_matches_all() {
        let items = sample();
        let out = filter_and_sort(&items, &StrategyFilter::default(), SortKey::Id, SortOrder::Ascending);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_filter_criteria() {
        let items = sample();
        let by = |f: StrategyFilter| -> Vec<String> {
            filter_and_sort(&items, &f, SortKey::Id, SortOrder::Ascending)
                .into_iter()
                .map(|s| s.id.clone())
                .collect()
        };

        assert_eq!(by(StrategyFilter { query: Some("VOICE".into()), ..Default::default() }), ["c"]);
        assert_eq!(by(StrategyFilter { protocol: Some(Protocol::Tcp), ..Default::default() }), ["a", "b"]);
        assert_eq!(by(StrategyFilter { port: Some(80), ..Default::default() }), ["b"]);
        assert_eq!(by(StrategyFilter { technique: Some("Fake".into()), ..Default::default() }), ["b", "c"]);
        assert_eq!(by(StrategyFilter { label: Some(StrategyLabel::Game), ..Default::default() }), ["c"]);
        assert_eq!(by(StrategyFilter { source: Some(SourceKind::Json), ..Default::default() }), ["c"]);
    }

    // ===== Sort Tests =====

    #[test]
    fn test_sort_by_name_breaks_ties_by_id() {
        let items = sample();
        let ids: Vec<_> = filter_and_sort(&items, &StrategyFilter::default(), SortKey::Name, SortOrder::Ascending)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_sort_by_label_descending() {
        let items = sample();
        let ids: Vec<_> = filter_and_sort(&items, &StrategyFilter::default(), SortKey::Label, SortOrder::Descending)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "c", "b"]);
    }

    #[test]
    fn test_sort_by_source() {
        let items = sample();
        let ids: Vec<_> = filter_and_sort(&items, &StrategyFilter::default(), SortKey::Source, SortOrder::Ascending)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_parse_sort_options() {
        assert_eq!("LABEL".parse::<SortKey>().unwrap(), SortKey::Label);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert!("size".parse::<SortKey>().is_err());
    }
}
