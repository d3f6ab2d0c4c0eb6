//! Hosts command - proxy services through the hosts file

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, warn};
use zapret_core::hosts::{domain_set, CatalogCache, HostsCatalog, Service, UserSelections};
use zapret_platform::{is_elevated, HostsFile};

use super::Context;

/// Hosts command arguments
#[derive(Args, Debug)]
pub struct HostsArgs {
    #[command(subcommand)]
    pub action: HostsAction,
}

/// Hosts subcommands
#[derive(Subcommand, Debug)]
pub enum HostsAction {
    /// List services and DNS profiles from the catalog
    Services,

    /// Show which selected services are present in the hosts file
    Status,

    /// Choose a DNS profile for a service
    Select {
        /// Service name as in the catalog
        service: String,

        /// DNS profile name
        #[arg(required_unless_present = "clear")]
        profile: Option<String>,

        /// Forget the selection instead
        #[arg(long)]
        clear: bool,
    },

    /// Rewrite catalog entries to match the selected services
    Apply,

    /// Remove entries of services (default: every catalog service)
    Remove {
        /// Services to remove
        services: Vec<String>,
    },
}

/// Execute hosts command
pub fn execute(args: HostsArgs, ctx: &Context) -> Result<()> {
    let paths = &ctx.settings.paths;
    let cache = CatalogCache::new(paths.hosts_catalog());
    let catalog = cache
        .get()
        .with_context(|| format!("Failed to load hosts catalog {}", cache.path().display()))?;
    let selections_path = paths.user_hosts();
    let mut selections = UserSelections::load(&selections_path)
        .with_context(|| format!("Failed to load {}", selections_path.display()))?;
    let hosts = HostsFile::new(paths.hosts_file());

    match args.action {
        HostsAction::Services => {
            services(&catalog, &selections);
            Ok(())
        }
        HostsAction::Status => status(&catalog, &selections, &hosts),
        HostsAction::Select {
            service,
            profile,
            clear,
        } => {
            let Some(svc) = catalog.service(&service) else {
                bail!("Unknown service '{service}'");
            };
            let service = svc.name.clone();
            if clear {
                if selections.clear(&service) {
                    println!("{} Cleared selection for {}", "✓".green(), service);
                } else {
                    println!("No selection for {service}");
                }
            } else {
                let profile = profile.context("A DNS profile is required")?;
                let Some(column) = catalog.profile_index(&profile) else {
                    bail!(
                        "Unknown DNS profile '{}'; available: {}",
                        profile,
                        catalog.profiles().join(", ")
                    );
                };
                if !selectable(&catalog, svc, column) {
                    bail!("{service} has no addresses in profile '{profile}'");
                }
                let profile = catalog.profiles()[column].clone();
                println!("{} {} -> {}", "✓".green(), service, profile.bold());
                selections.select(service, profile);
            }
            selections
                .save(&selections_path)
                .with_context(|| format!("Failed to save {}", selections_path.display()))?;
            Ok(())
        }
        HostsAction::Apply => apply(&catalog, &selections, &hosts),
        HostsAction::Remove { services } => {
            let domains = if services.is_empty() {
                catalog.all_domains()
            } else {
                let mut domains = HashSet::new();
                for name in &services {
                    let svc = catalog
                        .service(name)
                        .with_context(|| format!("Unknown service '{name}'"))?;
                    domains.extend(domain_set(svc.domains.iter().map(|d| &d.domain)));
                }
                domains
            };
            warn_if_not_elevated();
            let change = hosts
                .remove(&domains)
                .with_context(|| format!("Failed to update {}", hosts.path().display()))?;
            if change.written {
                println!("{} Removed {} entries", "✓".green(), change.entries);
            } else {
                println!("Nothing to remove");
            }
            Ok(())
        }
    }
}

fn services(catalog: &HostsCatalog, selections: &UserSelections) {
    let direct = catalog.direct_profile();
    println!("{}", "DNS profiles:".bold());
    for (i, profile) in catalog.profiles().iter().enumerate() {
        let note = if Some(i) == direct { " (direct)".dimmed() } else { "".normal() };
        println!("  {profile}{note}");
    }
    println!();
    println!("{}", "Services:".bold());
    for service in catalog.services() {
        let available: Vec<&str> = catalog
            .profiles()
            .iter()
            .enumerate()
            .filter(|(i, _)| service.available_in(*i))
            .map(|(_, p)| p.as_str())
            .collect();
        let selected = selections
            .get(&service.name)
            .map(|p| format!(" -> {}", p).green().to_string())
            .unwrap_or_default();
        println!(
            "  {}{}  {}",
            service.name.cyan(),
            selected,
            format!("[{}]", available.join(", ")).dimmed()
        );
    }
}

fn status(catalog: &HostsCatalog, selections: &UserSelections, hosts: &HostsFile) -> Result<()> {
    let all = catalog.all_domains();
    let present = hosts
        .status(&all)
        .with_context(|| format!("Failed to read {}", hosts.path().display()))?;

    println!("Hosts file: {}", hosts.path().display());
    for service in catalog.services() {
        let domains = domain_set(service.domains.iter().map(|d| &d.domain));
        let found = domains.intersection(&present).count();
        let selected = selections.get(&service.name);
        if selected.is_none() && found == 0 {
            continue;
        }
        let state = if found == domains.len() {
            "✓".green()
        } else if found == 0 {
            "✗".red()
        } else {
            "~".yellow()
        };
        println!(
            "  {} {:<24} {}/{}  {}",
            state,
            service.name,
            found,
            domains.len(),
            selected.unwrap_or("-")
        );
    }
    Ok(())
}

fn apply(catalog: &HostsCatalog, selections: &UserSelections, hosts: &HostsFile) -> Result<()> {
    if selections.is_empty() {
        warn!("No services selected, clearing every catalog entry");
    }

    let entries = plan(catalog, selections);
    warn_if_not_elevated();

    let change = hosts
        .sync(&catalog.all_domains(), &entries)
        .with_context(|| format!("Failed to update {}", hosts.path().display()))?;

    if change.written {
        println!("{} Hosts file updated ({} entries)", "✓".green(), change.entries);
    } else {
        println!("{} Hosts file already up to date", "✓".green());
    }
    Ok(())
}

/// Entries to write for the selected services
///
/// A service on the direct profile needs no hosts line; it gets none, and the
/// sync drops whatever line it had before.
fn plan(catalog: &HostsCatalog, selections: &UserSelections) -> Vec<(IpAddr, String)> {
    let direct = catalog.direct_profile();
    let mut proxied = UserSelections::default();

    for (service, profile) in selections.iter() {
        let is_direct = direct.is_some() && catalog.profile_index(profile) == direct;
        match catalog.service(service) {
            Some(_) if is_direct => debug!(service = %service, "Service routed directly"),
            Some(_) => proxied.select(service, profile),
            None => warn!(service = %service, "Selected service is not in the catalog"),
        }
    }

    zapret_core::hosts::resolve_entries(catalog, &proxied)
}

/// Whether a service may be pinned to a profile column
///
/// The direct profile is always allowed since it means "no hosts line".
fn selectable(catalog: &HostsCatalog, service: &Service, column: usize) -> bool {
    catalog.direct_profile() == Some(column) || service.available_in(column)
}

fn warn_if_not_elevated() {
    if !is_elevated() {
        warn!("Not running as administrator; writing the hosts file may need permission repair");
    }
}
