use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use super::ScanReport;
use crate::models::Severity;

/// Render a colored terminal summary of the finalized report.
pub fn render(report: &ScanReport, verbose: bool, quiet: bool) -> Result<()> {
    let summary = &report.scan_summary;

    if quiet {
        println!(
            "Manifests: {}  Dependencies: {}  Signals: {}  Vulnerabilities: {}  CVEs: {}",
            summary.total_manifests,
            summary.total_dependencies,
            summary.total_signals.to_string().yellow(),
            summary.total_vulnerabilities.to_string().red(),
            summary.total_cves.to_string().red(),
        );
        return Ok(());
    }

    println!("\n {} v{}", "chainmap".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Scanned: {} @ {}\n", report.repo.path, report.repo.commit_hash);

    let ecosystems: Vec<String> = summary
        .ecosystems_detected
        .iter()
        .map(|e| e.to_string())
        .collect();

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48}  │", "SUMMARY".bold());
    println!(" │  {:<48}  │", format!("Manifests        : {}", summary.total_manifests));
    println!(" │  {:<48}  │", format!("Ecosystems       : {}", ecosystems.join(", ")));
    println!(" │  {:<48}  │", format!("Dependencies     : {}", summary.total_dependencies));
    println!(" │  {:<48}  │", format!("Risk signals     : {}", summary.total_signals));
    println!(" │  {:<48}  │", format!("Vulnerabilities  : {}", summary.total_vulnerabilities));
    println!(" │  {:<48}  │", format!("CVEs             : {}", summary.total_cves));
    println!(" └────────────────────────────────────────────────────┘\n");

    let mut flagged: Vec<&super::DependencyEntry> = report
        .dependencies
        .iter()
        .filter(|d| !d.signals.is_empty())
        .collect();
    flagged.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));

    if !flagged.is_empty() {
        println!(" {} Dependencies with risk signals:\n", "[RISK]".red().bold());
        render_table(&flagged, verbose);
        println!();
    }

    if !report.partial_failures.is_empty() {
        println!(
            " {} {} partial failures (scan completed with degraded coverage):",
            "[WARN]".yellow().bold(),
            report.partial_failures.len()
        );
        for failure in &report.partial_failures {
            println!("   - [{}] {}: {}", failure.stage, failure.subject, failure.note);
        }
        println!();
    }

    Ok(())
}

fn render_table(flagged: &[&super::DependencyEntry], verbose: bool) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Ecosystem").add_attribute(Attribute::Bold),
            Cell::new("Manifest").add_attribute(Attribute::Bold),
            Cell::new("Signals").add_attribute(Attribute::Bold),
            Cell::new("Risk").add_attribute(Attribute::Bold),
        ]);

    let limit = if verbose { flagged.len() } else { 15.min(flagged.len()) };
    for entry in &flagged[..limit] {
        let worst = entry
            .signals
            .iter()
            .map(|s| s.severity)
            .max()
            .unwrap_or(Severity::Low);
        let risk_color = match worst {
            Severity::Low => Color::Green,
            Severity::Medium => Color::Yellow,
            Severity::High => Color::Red,
            Severity::Critical => Color::Magenta,
        };

        let signals: Vec<&str> = entry.signals.iter().map(|s| s.signal_type.as_str()).collect();
        table.add_row(vec![
            Cell::new(&entry.dependency.name),
            Cell::new(&entry.dependency.version),
            Cell::new(entry.ecosystem.to_string()),
            Cell::new(&entry.manifest_path),
            Cell::new(signals.join(", ")),
            Cell::new(format!("{:.2}", entry.risk_score)).fg(risk_color),
        ]);
    }

    println!("{}", table);
}
