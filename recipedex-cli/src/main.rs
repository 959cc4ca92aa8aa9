// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Recipedex CLI
//!
//! Loads record packs through a full reload and answers lookups against the
//! frozen index.

mod pack;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pack::{parse_item, FileContributor};
use recipedex_core::{ContentItem, Ingredient, RecipedexConfig, TransformationRecord};
use recipedex_index::ItemCounts;
use recipedex_plugins::{HostEvent, RecipeSession, RecordRegistry, ReloadReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "recipedex")]
#[command(about = "Recipedex - transformation record index", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record pack to load; repeat for several packs
    #[arg(short, long = "pack", required = true)]
    packs: Vec<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Records that produce an item
    Recipes {
        /// Item as `id` or `kind@id`
        item: String,
    },

    /// Records that consume an item
    Uses {
        /// Item as `id` or `kind@id`
        item: String,
    },

    /// Records craftable from the given stock
    Craftable {
        /// On-hand stock as `ITEM=N`; repeatable
        #[arg(long = "have", value_parser = parse_stock)]
        have: Vec<ContentItem>,
    },

    /// Index and reload statistics
    Stats,
}

fn parse_stock(s: &str) -> std::result::Result<ContentItem, String> {
    let (item, amount) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ITEM=N, got `{s}`"))?;
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid amount in `{s}`"))?;
    Ok(parse_item(item).with_amount(amount))
}

#[derive(Serialize)]
struct RecordView {
    id: String,
    category: String,
    kind: &'static str,
    location: Option<String>,
    contributor: Option<String>,
    inputs: Vec<Ingredient>,
    outputs: Vec<Ingredient>,
}

impl RecordView {
    fn new(record: &TransformationRecord, registry: &RecordRegistry) -> Self {
        Self {
            id: record.id().to_string(),
            category: record.category().to_string(),
            kind: record.kind().serializer_id(),
            location: record.location().map(|l| l.to_string()),
            contributor: registry.origin(record.id()).map(|o| o.contributor),
            inputs: record.inputs().to_vec(),
            outputs: record.outputs().to_vec(),
        }
    }
}

fn format_slots(slots: &[Ingredient]) -> String {
    slots
        .iter()
        .map(|slot| {
            let alternatives: Vec<_> = slot.non_empty().map(|item| item.to_string()).collect();
            if alternatives.is_empty() {
                "-".to_string()
            } else {
                alternatives.join(" | ")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_records(views: &[RecordView], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("No records found");
        return Ok(());
    }
    for view in views {
        println!(
            "[{}] {} -> {}  ({}{})",
            view.category,
            format_slots(&view.inputs),
            format_slots(&view.outputs),
            view.contributor.as_deref().unwrap_or("live"),
            view.location
                .as_deref()
                .map(|l| format!(", {l}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

fn print_stats(session: &RecipeSession, json: bool) -> Result<()> {
    let stats = session.records().stats();
    let report = session.last_report().unwrap_or_default();
    let dropped: Vec<_> = stats
        .last_freeze
        .as_ref()
        .map(|freeze| {
            freeze
                .dropped
                .iter()
                .map(|((category, reason), count)| {
                    serde_json::json!({
                        "category": category.as_str(),
                        "reason": reason.to_string(),
                        "count": count,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let summary = serde_json::json!({
        "generation": stats.index.generation,
        "frozen": stats.index.frozen,
        "records": stats.index.indexed,
        "categories": stats.categories,
        "input_keys": stats.index.input_keys,
        "output_keys": stats.index.output_keys,
        "dropped": dropped,
        "contributor_failures": report.contributor_failures.len(),
        "reloadable_failures": report.reloadable_failures.len(),
        "main_thread_handoffs": report.main_thread_handoffs,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Generation:    {}", stats.index.generation);
        println!("Records:       {}", stats.index.indexed);
        println!("Categories:    {}", stats.categories);
        println!(
            "Item keys:     {} in / {} out",
            stats.index.input_keys, stats.index.output_keys
        );
        for entry in &dropped {
            println!(
                "Dropped:       {} x{} ({})",
                entry["category"], entry["count"], entry["reason"]
            );
        }
        println!(
            "Failures:      {} contributor, {} reloadable",
            report.contributor_failures.len(),
            report.reloadable_failures.len()
        );
        println!("Reload took:   {:?}", report.elapsed);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn warn_failures(report: &ReloadReport) {
    for failure in report
        .contributor_failures
        .iter()
        .chain(&report.reloadable_failures)
    {
        tracing::warn!(
            subject = %failure.subject,
            phase = %failure.phase,
            stage = %failure.stage,
            "{}",
            failure.message
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => RecipedexConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RecipedexConfig::default(),
    };
    let reload_timeout = config.reload.interrupt_timeout() * 12;

    let session = RecipeSession::new(config);
    for path in &cli.packs {
        let contributor = FileContributor::load(path)?;
        info!(pack = %contributor.path().display(), "Loaded record pack");
        session.register_contributor(Arc::new(contributor))?;
    }

    session.handle(HostEvent::ReloadRequested(None))?;
    if !session.run_until_idle(reload_timeout.max(Duration::from_secs(60))) {
        session.orchestrator().terminate_running_reloads();
        bail!("Reload did not finish in time");
    }
    if let Some(report) = session.last_report() {
        warn_failures(&report);
        if report.interrupted {
            bail!("Reload was interrupted");
        }
    }

    let records = session.records();
    match cli.command {
        Commands::Recipes { item } => {
            let views: Vec<_> = records
                .recipes_for(&parse_item(&item))
                .iter()
                .map(|r| RecordView::new(r, records))
                .collect();
            print_records(&views, cli.json)?;
        }
        Commands::Uses { item } => {
            let views: Vec<_> = records
                .usages_for(&parse_item(&item))
                .iter()
                .map(|r| RecordView::new(r, records))
                .collect();
            print_records(&views, cli.json)?;
        }
        Commands::Craftable { have } => {
            let counts = ItemCounts::from_items(&have);
            let views: Vec<_> = records
                .index()
                .records()
                .iter()
                .filter(|r| records.is_craftable(r, &counts))
                .map(|r| RecordView::new(r, records))
                .collect();
            print_records(&views, cli.json)?;
        }
        Commands::Stats => print_stats(&session, cli.json)?,
    }

    Ok(())
}
