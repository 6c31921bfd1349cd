use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use flowmetrics::{
    build_source_report, merge_tables, render_table, Catalog, ColumnLabels, IdentityResolver,
    ItemRecord, MetricTable, ReportConfig, SourceReport,
};

#[derive(Parser)]
#[command(name = "flowmetrics", about = "Productivity metrics from work item status histories")]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build per-phase metric tables for one source
    Report {
        /// Report configuration (JSON)
        #[arg(long)]
        config: PathBuf,
        /// Work item histories (JSON array)
        #[arg(long)]
        items: PathBuf,
        /// Cutoff for unresolved items (RFC 3339; defaults to now)
        #[arg(long)]
        now: Option<String>,
        /// Replace member names with stable pseudonyms
        #[arg(long)]
        anonymize: bool,
        /// With --anonymize, print the pseudonym mapping to stderr
        #[arg(long, requires = "anonymize")]
        show_mapping: bool,
        /// Output the full report as JSON (input format for `aggregate`)
        #[arg(long)]
        json: bool,
    },
    /// Merge per-source reports into cross-source tables
    Aggregate {
        /// Report JSON files produced by `report --json`
        #[arg(required = true)]
        reports: Vec<PathBuf>,
        /// Configuration providing the shared metric catalog
        #[arg(long)]
        config: PathBuf,
        /// Replace member names with stable pseudonyms
        #[arg(long)]
        anonymize: bool,
        /// Output merged tables as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Report {
            config,
            items,
            now,
            anonymize,
            show_mapping,
            json,
        } => handle_report(&config, &items, now.as_deref(), anonymize, show_mapping, json),
        Commands::Aggregate {
            reports,
            config,
            anonymize,
            json,
        } => handle_aggregate(&reports, &config, anonymize, json),
    }
}

fn handle_report(
    config_path: &Path,
    items_path: &Path,
    now: Option<&str>,
    anonymize: bool,
    show_mapping: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = ReportConfig::from_json_file(config_path)?;
    let records = load_items(items_path)?;
    let now = match now {
        Some(raw) => flowmetrics::date_util::parse_timestamp(raw)?,
        None => chrono::Utc::now(),
    };

    let report = build_source_report(&config, &records, now)?;

    let mut resolver = IdentityResolver::new(config.salt.clone());
    let labels = member_labels(&config, anonymize, &mut resolver);
    if show_mapping {
        eprintln!("Pseudonym mapping:");
        for identity in resolver.mapping() {
            eprintln!("  {}\t{}", identity.pseudonym, identity.display_name);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (table, summary) in report.tables.iter().zip(&report.summaries) {
        println!("== {} ({}) ==", table.phase, report.source);
        print!("{}", render_table(table, &labels));
        if summary.excluded_items > 0 {
            println!(
                "({} of {} items excluded for inconsistent history; run with -v for details)",
                summary.excluded_items,
                summary.total_items + summary.excluded_items
            );
        }
        println!();
    }
    Ok(())
}

fn handle_aggregate(
    report_paths: &[PathBuf],
    config_path: &Path,
    anonymize: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = ReportConfig::from_json_file(config_path)?;
    let catalog = Catalog::standard(&config.states, &config.item_types);

    let reports: Vec<SourceReport> = report_paths
        .iter()
        .map(|p| load_report(p))
        .collect::<anyhow::Result<_>>()?;

    let mut merged: Vec<MetricTable> = Vec::with_capacity(config.phases.len());
    for phase in &config.phases {
        let phase_tables: Vec<MetricTable> = reports
            .iter()
            .filter_map(|r| {
                r.tables
                    .iter()
                    .find(|t| t.phase == phase.name)
                    .cloned()
            })
            .collect();
        if phase_tables.len() != reports.len() {
            anyhow::bail!(
                "phase '{}' is missing from one or more input reports",
                phase.name
            );
        }
        merged.push(merge_tables(&phase_tables, &catalog)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
        return Ok(());
    }

    let mut resolver = IdentityResolver::new(config.salt.clone());
    let labels = member_labels(&config, anonymize, &mut resolver);
    for table in &merged {
        println!("== {} ==", table.phase);
        print!("{}", render_table(table, &labels));
        println!();
    }
    Ok(())
}

fn load_items(path: &Path) -> anyhow::Result<Vec<ItemRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let records: Vec<ItemRecord> = serde_json::from_str(&raw)?;
    log::info!("Loaded {} work items from {}", records.len(), path.display());
    Ok(records)
}

fn load_report(path: &Path) -> anyhow::Result<SourceReport> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Person columns show the roster display name, or a stable pseudonym when
/// the output is meant to be shared. The resolver accumulates the mapping
/// for `--show-mapping`.
fn member_labels(
    config: &ReportConfig,
    anonymize: bool,
    resolver: &mut IdentityResolver,
) -> ColumnLabels {
    let mut labels = ColumnLabels::new();
    for member in &config.members {
        let identity = resolver.resolve(&member.key, member.display_name.as_deref());
        let label = if anonymize {
            identity.pseudonym.clone()
        } else {
            identity.display_name.clone()
        };
        labels.insert(&member.key, &label);
    }
    labels
}
