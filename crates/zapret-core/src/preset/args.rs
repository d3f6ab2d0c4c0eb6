//! Typed views of `--out-range=`, `--syndata=` and `--send=` fragments
//!
//! Values are colon separated `key=value` lists, e.g.
//! `--syndata=blob=tls_google:tls_mod=rnd:ip_autottl=-2,3-20`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Unit of an `--out-range` limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutRangeMode {
    /// `n` - packet counter
    Packets,
    /// `d` - data packet counter
    DataPackets,
    /// `s` - relative sequence
    Sequence,
    /// `b` - byte counter
    Bytes,
}

impl OutRangeMode {
    /// Mode letter used on the command line
    pub fn letter(&self) -> char {
        match self {
            OutRangeMode::Packets => 'n',
            OutRangeMode::DataPackets => 'd',
            OutRangeMode::Sequence => 's',
            OutRangeMode::Bytes => 'b',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'n' => Some(OutRangeMode::Packets),
            'd' => Some(OutRangeMode::DataPackets),
            's' => Some(OutRangeMode::Sequence),
            'b' => Some(OutRangeMode::Bytes),
            _ => None,
        }
    }
}

/// `--out-range=-n8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutRange {
    /// Upper limit
    pub value: u64,
    /// Counter the limit applies to
    pub mode: OutRangeMode,
}

impl OutRange {
    /// Command-line form
    pub fn to_arg(&self) -> String {
        format!("--out-range=-{}{}", self.mode.letter(), self.value)
    }

    /// Dictionary form: `{"out_range": 8, "out_range_mode": "n"}`
    pub fn to_map(&self) -> Value {
        json!({
            "out_range": self.value,
            "out_range_mode": self.mode.letter().to_string(),
        })
    }
}

/// Parse `--out-range=-n8` (the `--out-range=` prefix and dash are optional)
pub fn parse_out_range(arg: &str) -> Result<OutRange> {
    let value = arg.strip_prefix("--out-range=").unwrap_or(arg).trim();
    let spec = value.strip_prefix('-').unwrap_or(value);

    let mut chars = spec.chars();
    let letter = chars
        .next()
        .ok_or_else(|| Error::invalid_argument(arg, "empty range"))?;
    let mode = OutRangeMode::from_letter(letter)
        .ok_or_else(|| Error::invalid_argument(arg, format!("unknown mode '{letter}'")))?;
    let value = chars
        .as_str()
        .parse::<u64>()
        .map_err(|e| Error::invalid_argument(arg, format!("invalid limit: {e}")))?;

    Ok(OutRange { value, mode })
}

/// `delta,min-max` auto TTL triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoTtl {
    /// Offset from the detected hop count
    pub delta: i16,
    /// Lower TTL bound
    pub min: u8,
    /// Upper TTL bound
    pub max: u8,
}

impl AutoTtl {
    fn parse(arg: &str, value: &str) -> Result<Self> {
        let bad = |msg: &str| Error::invalid_argument(arg, format!("autottl '{value}': {msg}"));

        let (delta, range) = match value.split_once(',') {
            Some((d, r)) => (d, Some(r)),
            None => (value, None),
        };
        let delta = delta.trim().parse::<i16>().map_err(|_| bad("invalid delta"))?;
        let (min, max) = match range {
            Some(r) => {
                let (min, max) = r.split_once('-').ok_or_else(|| bad("expected min-max"))?;
                let min = min.trim().parse::<u8>().map_err(|_| bad("invalid min"))?;
                let max = max.trim().parse::<u8>().map_err(|_| bad("invalid max"))?;
                if min > max {
                    return Err(bad("min is greater than max"));
                }
                (min, max)
            }
            None => (1, 64),
        };
        Ok(Self { delta, min, max })
    }

    fn to_value(self) -> String {
        format!("{},{}-{}", self.delta, self.min, self.max)
    }
}

/// `--syndata` settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyndataSettings {
    /// Payload blob name
    pub blob: Option<String>,
    /// TLS modification list
    pub tls_mod: Option<String>,
    /// `ip_autottl` triple
    pub autottl: Option<AutoTtl>,
    /// Other keys in order
    pub extra: Vec<(String, String)>,
}

impl SyndataSettings {
    /// Command-line form
    pub fn to_arg(&self) -> String {
        let mut parts = Vec::new();
        if let Some(blob) = &self.blob {
            parts.push(format!("blob={blob}"));
        }
        if let Some(tls_mod) = &self.tls_mod {
            parts.push(format!("tls_mod={tls_mod}"));
        }
        if let Some(autottl) = self.autottl {
            parts.push(format!("ip_autottl={}", autottl.to_value()));
        }
        parts.extend(self.extra.iter().map(|(k, v)| join_kv(k, v)));

        if parts.is_empty() {
            "--syndata".to_string()
        } else {
            format!("--syndata={}", parts.join(":"))
        }
    }

    /// Dictionary form used by the strategy editor
    pub fn to_map(&self) -> Value {
        let mut map = Map::new();
        map.insert("enabled".into(), Value::Bool(true));
        if let Some(blob) = &self.blob {
            map.insert("blob".into(), Value::from(blob.as_str()));
        }
        if let Some(tls_mod) = &self.tls_mod {
            map.insert("tls_mod".into(), Value::from(tls_mod.as_str()));
        }
        if let Some(autottl) = self.autottl {
            map.insert("autottl_delta".into(), Value::from(autottl.delta));
            map.insert("autottl_min".into(), Value::from(autottl.min));
            map.insert("autottl_max".into(), Value::from(autottl.max));
        }
        Value::Object(map)
    }
}

/// Parse `--syndata` or `--syndata=key=value:...`
pub fn parse_syndata(arg: &str) -> Result<SyndataSettings> {
    let mut settings = SyndataSettings::default();
    for (key, value) in split_pairs(arg, "--syndata")? {
        match key {
            "blob" => settings.blob = Some(value.to_string()),
            "tls_mod" => settings.tls_mod = Some(value.to_string()),
            "ip_autottl" | "autottl" => settings.autottl = Some(AutoTtl::parse(arg, value)?),
            _ => settings.extra.push((key.to_string(), value.to_string())),
        }
    }
    Ok(settings)
}

/// `--send` settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSettings {
    /// How many times each packet is sent
    pub repeats: Option<u32>,
    /// IPv4 TTL
    pub ip_ttl: Option<u8>,
    /// IPv6 hop limit
    pub ip6_ttl: Option<u8>,
    /// IP id policy (`seq`, `zero`, `rnd`)
    pub ip_id: Option<String>,
    /// Corrupt the transport checksum
    pub badsum: bool,
}

impl SendSettings {
    /// Command-line form
    pub fn to_arg(&self) -> String {
        let mut parts = Vec::new();
        if let Some(repeats) = self.repeats {
            parts.push(format!("repeats={repeats}"));
        }
        if let Some(ttl) = self.ip_ttl {
            parts.push(format!("ttl={ttl}"));
        }
        if let Some(ttl) = self.ip6_ttl {
            parts.push(format!("ip6_ttl={ttl}"));
        }
        if let Some(ip_id) = &self.ip_id {
            parts.push(format!("ip_id={ip_id}"));
        }
        if self.badsum {
            parts.push("badsum".to_string());
        }

        if parts.is_empty() {
            "--send".to_string()
        } else {
            format!("--send={}", parts.join(":"))
        }
    }

    /// Dictionary form used by the strategy editor
    pub fn to_map(&self) -> Value {
        json!({
            "send_enabled": true,
            "send_repeats": self.repeats,
            "send_ip_ttl": self.ip_ttl,
            "send_ip6_ttl": self.ip6_ttl,
            "send_ip_id": self.ip_id,
            "send_badsum": self.badsum,
        })
    }
}

/// Parse `--send` or `--send=key=value:...`
pub fn parse_send(arg: &str) -> Result<SendSettings> {
    let mut settings = SendSettings::default();
    for (key, value) in split_pairs(arg, "--send")? {
        let number = |what: &str| {
            value
                .parse::<u32>()
                .map_err(|_| Error::invalid_argument(arg, format!("{what} must be a number, got '{value}'")))
        };
        let ttl = |what: &str| {
            let n = number(what)?;
            u8::try_from(n).map_err(|_| Error::invalid_argument(arg, format!("{what} must be at most 255")))
        };

        match key {
            "repeats" => settings.repeats = Some(number("repeats")?),
            "ttl" | "ip_ttl" => settings.ip_ttl = Some(ttl("ttl")?),
            "ip6_ttl" => settings.ip6_ttl = Some(ttl("ip6_ttl")?),
            "ip_id" => settings.ip_id = Some(value.to_string()),
            "badsum" => settings.badsum = value.is_empty() || value == "1" || value == "true",
            _ => {
                return Err(Error::invalid_argument(arg, format!("unknown key '{key}'")));
            }
        }
    }
    Ok(settings)
}

fn split_pairs<'a>(arg: &'a str, flag: &str) -> Result<Vec<(&'a str, &'a str)>> {
    let rest = arg.trim();
    let rest = match rest.strip_prefix(flag) {
        Some("") => return Ok(Vec::new()),
        Some(r) => r
            .strip_prefix('=')
            .ok_or_else(|| Error::invalid_argument(arg, format!("expected '{flag}='")))?,
        None => rest,
    };

    Ok(rest
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect())
}

fn join_kv(key: &str, value: &str) -> String {
    if value.is_empty() {
        key.to_string()
    } else {
        format!("{key}={value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_range_documented_shape() {
        let range = parse_out_range("--out-range=-n8").unwrap();
        assert_eq!(range, OutRange { value: 8, mode: OutRangeMode::Packets });
        assert_eq!(range.to_map(), json!({"out_range": 8, "out_range_mode": "n"}));
        assert_eq!(range.to_arg(), "--out-range=-n8");
    }

    #[test]
    fn test_out_range_variants() {
        assert_eq!(parse_out_range("-d10").unwrap().mode, OutRangeMode::DataPackets);
        assert_eq!(parse_out_range("s4096").unwrap().value, 4096);
        assert!(parse_out_range("--out-range=-x3").is_err());
        assert!(parse_out_range("--out-range=-n").is_err());
        assert!(parse_out_range("--out-range=").is_err());
    }

    #[test]
    fn test_syndata() {
        let s = parse_syndata("--syndata=blob=tls_google:tls_mod=rnd:ip_autottl=-2,3-20").unwrap();
        assert_eq!(s.blob.as_deref(), Some("tls_google"));
        assert_eq!(s.tls_mod.as_deref(), Some("rnd"));
        assert_eq!(s.autottl, Some(AutoTtl { delta: -2, min: 3, max: 20 }));
        assert_eq!(
            s.to_map(),
            json!({
                "enabled": true,
                "blob": "tls_google",
                "tls_mod": "rnd",
                "autottl_delta": -2,
                "autottl_min": 3,
                "autottl_max": 20,
            })
        );
        assert_eq!(s.to_arg(), "--syndata=blob=tls_google:tls_mod=rnd:ip_autottl=-2,3-20");
    }

    #[test]
    fn test_syndata_bare_flag() {
        let s = parse_syndata("--syndata").unwrap();
        assert_eq!(s, SyndataSettings::default());
        assert_eq!(s.to_map(), json!({"enabled": true}));
        assert!(parse_syndata("--syndata=ip_autottl=-1,9-3").is_err());
    }

    #[test]
    fn test_send() {
        let s = parse_send("--send=repeats=2:ttl=4:ip_id=zero:badsum").unwrap();
        assert_eq!(s.repeats, Some(2));
        assert_eq!(s.ip_ttl, Some(4));
        assert_eq!(s.ip_id.as_deref(), Some("zero"));
        assert!(s.badsum);
        assert_eq!(s.to_map()["send_repeats"], json!(2));
        assert_eq!(s.to_map()["send_ip6_ttl"], Value::Null);
        assert_eq!(s.to_arg(), "--send=repeats=2:ttl=4:ip_id=zero:badsum");
    }

    #[test]
    fn test_send_errors() {
        assert!(parse_send("--send=ttl=300").is_err());
        assert!(parse_send("--send=repeats=many").is_err());
        assert!(parse_send("--send=bogus=1").is_err());
        assert!(parse_send("--sendx").is_err());
    }
}
