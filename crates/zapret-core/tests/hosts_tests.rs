//! Integration tests for the hosts catalog and hosts-file transforms

use proptest::prelude::*;
use std::net::IpAddr;
use zapret_core::hosts::{
    apply_entries, domain_set, present_domains, remove_domains, replace_entries, resolve_entries,
    HostsCatalog, UserSelections,
};

const CATALOG: &str = "\
; Zapret hosts catalog
[DNS]
Zapret DNS
XBOX DNS
Без прокси

[__ipv6_status__]
disabled

[__ipv6_dns_providers__]
2a01:4f8::1

[YouTube]
youtube.com
185.246.223.127
176.99.11.77
142.250.74.46
www.youtube.com
185.246.223.127
-
142.250.74.78

[ChatGPT]
chatgpt.com
185.246.223.127
176.99.11.77
none
";

// ===== Catalog Tests =====

#[test]
fn test_meta_sections_are_not_services() {
    let catalog = HostsCatalog::parse(CATALOG).unwrap();
    assert_eq!(catalog.service_names(), ["YouTube", "ChatGPT"]);
    assert_eq!(catalog.meta("__ipv6_status__"), Some(&["disabled".to_string()][..]));
    assert!(catalog.service("__ipv6_dns_providers__").is_none());
}

#[test]
fn test_direct_profile_by_keyword() {
    let catalog = HostsCatalog::parse(CATALOG).unwrap();
    assert_eq!(catalog.direct_profile(), Some(2));
}

#[test]
fn test_direct_profile_by_distinct_ips() {
    let text = "\
[DNS]
Proxy A
Proxy B
Plain

[Svc]
a.com
10.0.0.1
10.0.1.1
1.1.1.1
b.com
10.0.0.1
10.0.1.1
2.2.2.2
c.com
10.0.0.1
10.0.1.2
3.3.3.3
";
    let catalog = HostsCatalog::parse(text).unwrap();
    assert_eq!(catalog.direct_profile(), Some(2));
}

#[test]
fn test_direct_profile_ambiguous() {
    let text = "[DNS]\nA\nB\n[Svc]\na.com\n1.1.1.1\n2.2.2.2\nb.com\n1.1.1.2\n2.2.2.3\n";
    let catalog = HostsCatalog::parse(text).unwrap();
    assert_eq!(catalog.direct_profile(), None);
}

#[test]
fn test_resolve_selected_profile() {
    let catalog = HostsCatalog::parse(CATALOG).unwrap();
    let mut selections = UserSelections::default();
    selections.select("YouTube", "XBOX DNS");

    let entries = resolve_entries(&catalog, &selections);
    let ip: IpAddr = "176.99.11.77".parse().unwrap();
    assert_eq!(entries, vec![(ip, "youtube.com".to_string())]);
}

#[test]
fn test_apply_then_remove_restores_original() {
    let original = "# hosts\n127.0.0.1 localhost\n";
    let catalog = HostsCatalog::parse(CATALOG).unwrap();
    let entries = catalog.entries_for("YouTube", "Zapret DNS").unwrap();

    let applied = apply_entries(original, &entries);
    assert_eq!(present_domains(&applied, &catalog.all_domains()).len(), 2);

    let removed = remove_domains(&applied, &catalog.all_domains());
    assert_eq!(removed, original);
}

#[test]
fn test_profile_switch_leaves_no_stale_entries() {
    let catalog = HostsCatalog::parse(CATALOG).unwrap();
    let managed = catalog.all_domains();
    let mut selections = UserSelections::default();

    selections.select("YouTube", "Zapret DNS");
    let first = replace_entries("127.0.0.1 localhost\n", &managed, &resolve_entries(&catalog, &selections));
    assert!(first.contains("185.246.223.127 www.youtube.com"));

    // www.youtube.com has no address in XBOX DNS
    selections.select("YouTube", "XBOX DNS");
    let second = replace_entries(&first, &managed, &resolve_entries(&catalog, &selections));
    assert_eq!(second, "127.0.0.1 localhost\n176.99.11.77 youtube.com\n");
    assert_eq!(present_domains(&second, &managed), domain_set(["youtube.com"]));

    let cleared = replace_entries(&second, &managed, &resolve_entries(&catalog, &UserSelections::default()));
    assert_eq!(cleared, "127.0.0.1 localhost\n");
}

// ===== Property Tests =====

fn domain() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.(com|net|org)"
}

fn hosts_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("# comment".to_string()),
        Just(String::new()),
        (domain(), 1u8..=254).prop_map(|(d, n)| format!("10.0.0.{n} {d}")),
        (domain(), 1u8..=254).prop_map(|(d, n)| format!("10.1.0.{n}\t{}", d.to_uppercase())),
    ]
}

proptest! {
    #[test]
    fn prop_remove_is_idempotent(
        lines in prop::collection::vec(hosts_line(), 0..20),
        targets in prop::collection::vec(domain(), 0..5),
    ) {
        let text = lines.join("\n");
        let set = domain_set(&targets);
        let once = remove_domains(&text, &set);
        prop_assert_eq!(remove_domains(&once, &set), once.clone());
        prop_assert!(present_domains(&once, &set).is_empty());
    }

    #[test]
    fn prop_apply_is_idempotent(
        lines in prop::collection::vec(hosts_line(), 0..20),
        targets in prop::collection::vec((domain(), 1u8..=254), 0..5),
    ) {
        let text = lines.join("\n");
        let entries: Vec<(IpAddr, String)> = targets
            .into_iter()
            .map(|(d, n)| (IpAddr::from([192, 168, 0, n]), d))
            .collect();
        let once = apply_entries(&text, &entries);
        prop_assert_eq!(apply_entries(&once, &entries), once.clone());
        let wanted = domain_set(entries.iter().map(|(_, d)| d));
        prop_assert_eq!(present_domains(&once, &wanted), wanted);
    }
}
