//! Hosts-file based domain proxying
//!
//! - **catalog** - `hosts.ini` with DNS profiles and per-profile IPs
//! - **selection** - the user's chosen profile per service
//! - **editor** - pure text transforms over the OS hosts file

mod catalog;
mod editor;
mod selection;

pub use catalog::{is_meta_section, CatalogCache, DomainEntry, HostsCatalog, Service};
pub use editor::{apply_entries, domain_set, present_domains, remove_domains, replace_entries};
pub use selection::{resolve_entries, UserSelections};
