//! Text transforms over the OS hosts file (`<ip> <domain>` lines)

use std::collections::HashSet;
use std::fmt::Write as _;
use std::net::IpAddr;

/// Lowercased domain set used for matching
pub fn domain_set<I, S>(domains: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    domains
        .into_iter()
        .map(|d| d.as_ref().trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Domain of a hosts line: the second whitespace token, ignoring comments
fn line_domain(line: &str) -> Option<&str> {
    let content = line.split('#').next().unwrap_or_default();
    let mut tokens = content.split_whitespace();
    tokens.next()?;
    tokens.next()
}

fn line_matches(line: &str, domains: &HashSet<String>) -> bool {
    line_domain(line).map_or(false, |d| domains.contains(&d.to_lowercase()))
}

/// Drop every line whose domain is in `domains`
///
/// Comments, blank lines and unrelated entries are kept byte for byte.
/// Trailing blank lines are collapsed to one final newline.
pub fn remove_domains(text: &str, domains: &HashSet<String>) -> String {
    let mut kept: Vec<&str> = text.lines().filter(|l| !line_matches(l, domains)).collect();
    while kept.last().map_or(false, |l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept.join(line_ending(text));
    if !out.is_empty() {
        out.push_str(line_ending(text));
    }
    out
}

/// Replace the entries' domains with fresh `ip domain` lines
///
/// Running it twice with the same entries gives the same text.
pub fn apply_entries(text: &str, entries: &[(IpAddr, String)]) -> String {
    let domains = domain_set(entries.iter().map(|(_, d)| d));
    let mut out = remove_domains(text, &domains);
    let eol = line_ending(text);

    let mut seen = HashSet::new();
    for (ip, domain) in entries {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() || !seen.insert(domain.clone()) {
            continue;
        }
        let _ = write!(out, "{ip} {domain}{eol}");
    }
    out
}

/// Drop every line for the `managed` domains, then append `entries`
///
/// Managed domains missing from `entries` end up with no line at all, so a
/// domain that has no address in a newly selected profile stops pointing at
/// the old one.
pub fn replace_entries(text: &str, managed: &HashSet<String>, entries: &[(IpAddr, String)]) -> String {
    apply_entries(&remove_domains(text, managed), entries)
}

/// Which of `domains` currently have an entry
pub fn present_domains(text: &str, domains: &HashSet<String>) -> HashSet<String> {
    text.lines()
        .filter_map(line_domain)
        .map(str::to_lowercase)
        .filter(|d| domains.contains(d))
        .collect()
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
