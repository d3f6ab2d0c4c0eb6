//! Strategy command - browse strategies from the strategies directory

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use zapret_core::preset::Protocol;
use zapret_core::strategy::{
    SortKey, SortOrder, SourceKind, StrategyFilter, StrategyInfo, StrategyLabel, StrategySource,
};
use zapret_core::StrategyCatalog;

use super::Context;

/// Strategy command arguments
#[derive(Args, Debug)]
pub struct StrategyArgs {
    #[command(subcommand)]
    pub action: StrategyAction,
}

/// Strategy subcommands
#[derive(Subcommand, Debug)]
pub enum StrategyAction {
    /// List strategies
    ///
    /// Filter and sort options default to the saved preferences.
    List(ListArgs),

    /// Show one strategy
    Show {
        /// Strategy id
        id: String,
    },
}

/// Filter and sort options for `strategy list`
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Search name, id, description and author
    #[arg(long)]
    pub query: Option<String>,

    /// Only strategies filtering this protocol
    #[arg(long)]
    pub protocol: Option<Protocol>,

    /// Only strategies covering this port
    #[arg(long)]
    pub port: Option<u16>,

    /// Only strategies using this desync technique
    #[arg(long)]
    pub technique: Option<String>,

    /// Only strategies with this label
    #[arg(long)]
    pub label: Option<StrategyLabel>,

    /// Only strategies from this kind of file (bat or json)
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// Sort column: name, label, source or id
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Sort direction: asc or desc
    #[arg(long)]
    pub order: Option<SortOrder>,

    /// Ignore the saved filter
    #[arg(long)]
    pub all: bool,

    /// Save these options as the new defaults
    #[arg(long)]
    pub save: bool,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    /// Merge with the saved preferences; flags win over saved values
    pub fn resolve(&self, saved: &StrategyFilter, key: SortKey, order: SortOrder) -> (StrategyFilter, SortKey, SortOrder) {
        let base = if self.all { StrategyFilter::default() } else { saved.clone() };
        let filter = StrategyFilter {
            query: self.query.clone().or(base.query),
            protocol: self.protocol.or(base.protocol),
            port: self.port.or(base.port),
            technique: self.technique.clone().or(base.technique),
            label: self.label.or(base.label),
            source: self.source.or(base.source),
        };
        (filter, self.sort.unwrap_or(key), self.order.unwrap_or(order))
    }
}

/// Execute strategy command
pub fn execute(args: StrategyArgs, ctx: &mut Context) -> Result<()> {
    let dir = ctx.settings.paths.strategies_dir();
    let catalog = StrategyCatalog::load_dir(&dir)
        .with_context(|| format!("Failed to load strategies from {}", dir.display()))?;

    match args.action {
        StrategyAction::List(list) => {
            let prefs = &ctx.settings.strategies;
            let (filter, key, order) = list.resolve(&prefs.filter, prefs.sort_key, prefs.sort_order);
            let items = catalog.query(&filter, key, order);

            if list.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No strategies match ({} loaded)", catalog.len());
            } else {
                let last = ctx.settings.strategies.last_applied.as_deref();
                for info in &items {
                    print_row(info, last);
                }
                println!();
                println!("{} of {} strategies, sorted by {} {}", items.len(), catalog.len(), key, order);
            }

            if list.save {
                let prefs = &mut ctx.settings.strategies;
                prefs.filter = filter;
                prefs.sort_key = key;
                prefs.sort_order = order;
                ctx.save_settings()?;
            }
            Ok(())
        }
        StrategyAction::Show { id } => {
            let info = catalog
                .get(&id)
                .with_context(|| format!("Unknown strategy '{id}'"))?;
            print_details(info);
            Ok(())
        }
    }
}

fn label_badge(label: Option<StrategyLabel>) -> colored::ColoredString {
    match label {
        Some(StrategyLabel::Recommended) => "recommended".green(),
        Some(StrategyLabel::Stable) => "stable".blue(),
        Some(StrategyLabel::Game) => "game".magenta(),
        Some(StrategyLabel::Experimental) => "experimental".yellow(),
        Some(StrategyLabel::Caution) => "caution".red(),
        None => "".normal(),
    }
}

fn print_row(info: &StrategyInfo, last_applied: Option<&str>) {
    let marker = if last_applied.is_some_and(|id| id.eq_ignore_ascii_case(&info.id)) {
        "●".green()
    } else {
        " ".normal()
    };
    let techniques: Vec<&str> = info.techniques.iter().map(String::as_str).collect();
    println!(
        "{} {:<28} {:<32} {:<13} {}",
        marker,
        info.id.cyan(),
        info.name,
        label_badge(info.label),
        techniques.join(",").dimmed()
    );
}

fn print_details(info: &StrategyInfo) {
    println!("{} ({})", info.name.bold(), info.id.cyan());
    if info.label.is_some() {
        println!("  Label:       {}", label_badge(info.label));
    }
    if let Some(description) = &info.description {
        println!("  Description: {description}");
    }
    if let Some(author) = &info.author {
        println!("  Author:      {author}");
    }
    let (StrategySource::Bat(path) | StrategySource::Json(path)) = &info.source;
    println!("  Source:      {} ({})", path.display(), info.source.kind());

    let protocols: Vec<&str> = info.protocols.iter().map(|p| p.as_str()).collect();
    let ports: Vec<String> = info.ports.iter().map(ToString::to_string).collect();
    let techniques: Vec<&str> = info.techniques.iter().map(String::as_str).collect();
    println!("  Protocols:   {}", protocols.join(", "));
    println!("  Ports:       {}", ports.join(","));
    println!("  Techniques:  {}", techniques.join(", "));
    println!();
    println!("  {}", info.args.join(" ").dimmed());
}
