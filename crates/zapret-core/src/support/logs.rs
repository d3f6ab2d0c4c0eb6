//! Log file collection for upload

use crate::error::Result;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// A log file read for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    /// Full path
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Contents, possibly trimmed to the tail
    pub contents: Vec<u8>,
    /// Whether the head was dropped
    pub truncated: bool,
    /// Last modification time
    pub modified: SystemTime,
}

fn is_log_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".log") || lower.contains(".log.")
}

/// Newest `limit` log files in `dir`
///
/// A file qualifies when its name ends in `.log` or carries a rotation suffix
/// (`app.log.2024-05-01`). Files over `max_bytes` keep only their last
/// `max_bytes`, cut forward to the first complete line.
pub fn collect_logs(dir: &Path, limit: usize, max_bytes: u64) -> Result<Vec<LogFile>> {
    let mut candidates: Vec<(SystemTime, PathBuf, String)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_log_name(&name) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, entry.path(), name));
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.2.cmp(&a.2)));
    candidates.truncate(limit);

    candidates
        .into_iter()
        .map(|(modified, path, name)| {
            let (contents, truncated) = read_tail(&path, max_bytes)?;
            debug!(file = %name, bytes = contents.len(), truncated, "Collected log file");
            Ok(LogFile {
                path,
                name,
                contents,
                truncated,
                modified,
            })
        })
        .collect()
}

fn read_tail(path: &Path, max_bytes: u64) -> Result<(Vec<u8>, bool)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len <= max_bytes {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;
        return Ok((buf, false));
    }

    file.seek(SeekFrom::Start(len - max_bytes))?;
    let mut buf = Vec::with_capacity(max_bytes as usize);
    file.take(max_bytes).read_to_end(&mut buf)?;
    if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        if pos + 1 < buf.len() {
            buf.drain(..=pos);
        }
    }
    Ok((buf, true))
}

/// Join several log files into one text attachment
pub fn bundle_logs(files: &[LogFile]) -> Vec<u8> {
    let mut out = Vec::new();
    for file in files {
        let marker = if file.truncated { " (tail)" } else { "" };
        out.extend_from_slice(format!("===== {}{} =====\n", file.name, marker).as_bytes());
        out.extend_from_slice(&file.contents);
        if !file.contents.ends_with(b"\n") {
            out.push(b'\n');
        }
        out.push(b'\n');
    }
    out
}
