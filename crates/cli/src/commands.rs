use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use shelfmark_config::{Config, ConfigManager};
use shelfmark_transfer::{
    ItemStatus, PreIngestTransfer, Readiness, TransferRegistry, TransferReport, TransferState,
};
use std::path::Path;

/// Write a default config file
pub fn init_config(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;

    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }

    Ok(())
}

/// Run one transfer batch over the configured collections
pub fn run_transfer(config: &Config, json: bool) -> Result<()> {
    if let Err(errors) = config.validate().and_then(|_| config.check_directories()) {
        for error in &errors {
            eprintln!("{} {}", style("✗").red().bold(), error);
        }
        bail!("Configuration is not usable ({} problems)", errors.len());
    }

    let collections = config.collections.roots();
    if collections.is_empty() {
        bail!("No collection directories configured");
    }

    log::debug!(
        "Transferring {} collection(s) into {}",
        collections.len(),
        config.transfer.ingest_dir.display()
    );
    let transfer = PreIngestTransfer::new(config.transfer.clone());
    let report = transfer.run(&collections);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    if report.failed() > 0 {
        bail!("{} item(s) failed to transfer", report.failed());
    }

    Ok(())
}

/// Show the registry state and history of one item
pub fn show_status(item_dir: &Path, json: bool) -> Result<()> {
    if !item_dir.is_dir() {
        bail!("Not a directory: {}", item_dir.display());
    }

    let registry = TransferRegistry::new(item_dir);
    let state = registry.state().context("Failed to read transfer registry")?;
    let events = registry.events().context("Failed to read transfer registry")?;

    if json {
        let value = serde_json::json!({
            "item": item_dir,
            "state": state,
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("\n{}", style(item_dir.display()).bold());
    println!("  State: {}", describe_state(&state));
    if events.is_empty() {
        println!("  No transfers recorded");
    }
    for event in events {
        println!("  {:<7} {}", event.kind, format_timestamp(event.timestamp));
    }

    Ok(())
}

/// Evaluate the readiness gates for one item
pub fn check_item(config: &Config, item_dir: &Path) -> Result<()> {
    let transfer = PreIngestTransfer::new(config.transfer.clone());
    let registry = TransferRegistry::new(item_dir);

    if registry.has_been_ingested() {
        println!(
            "{} already ingested; the next run sends updates",
            style(item_dir.display()).bold()
        );
        return Ok(());
    }

    log::debug!(
        "Checking {} against {} required format(s)",
        item_dir.display(),
        config.transfer.required_formats.len()
    );
    match transfer
        .ready_for_ingest(item_dir, Utc::now())
        .context("Failed to evaluate readiness")?
    {
        Readiness::Ready => println!(
            "{} {} is ready for ingest",
            style("✓").green().bold(),
            item_dir.display()
        ),
        Readiness::NotReady(reason) => println!(
            "{} {} is not ready: {}",
            style("✗").yellow().bold(),
            item_dir.display(),
            reason
        ),
    }

    Ok(())
}

fn print_report(report: &TransferReport) {
    println!("\n{} Items Processed", style(report.outcomes.len()).bold().cyan());
    println!("{}", "=".repeat(80));

    for outcome in &report.outcomes {
        println!("  {:<30} {}", truncate(&outcome.item_id, 30), describe_status(&outcome.status));
    }

    println!("{}", "=".repeat(80));
    println!(
        "Ingested: {} | Updated: {} | Not ready: {} | Failed: {} | Files copied: {}",
        style(report.ingested()).green(),
        report.updated(),
        report.not_ready(),
        style(report.failed()).red(),
        report.files_copied()
    );
}

fn describe_status(status: &ItemStatus) -> String {
    match status {
        ItemStatus::Ingested { files } => format!("ingested ({} files)", files),
        ItemStatus::Updated {
            content_files,
            metadata_files,
        } => format!(
            "updated ({} content, {} metadata)",
            content_files, metadata_files
        ),
        ItemStatus::NotReady(reason) => format!("not ready: {}", reason),
        ItemStatus::Failed(error) => format!("FAILED: {}", error),
    }
}

fn describe_state(state: &TransferState) -> String {
    match state {
        TransferState::NeverIngested => "never ingested".to_string(),
        TransferState::Ingested { ingest_date } => {
            format!("ingested {}", format_timestamp(*ingest_date))
        }
        TransferState::IngestedAndUpdated {
            ingest_date,
            latest_update,
        } => format!(
            "ingested {}, last update {}",
            format_timestamp(*ingest_date),
            format_timestamp(*latest_update)
        ),
        TransferState::Inconsistent => "registry present but holds no ingest record".to_string(),
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{}...", head)
    }
}
