//! `chainmap` — inventory a repository's dependency surface and flag
//! supply-chain risk.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load the scan config ([`config::load_config`]) — invalid config is fatal.
//! 3. Walk the repository and run the static phase: parse, normalize, and
//!    evaluate every manifest ([`scan`]).
//! 4. Optionally correlate coordinates against the vulnerability and CVE
//!    feeds (`--online`, [`correlator`]).
//! 5. Build the report ([`report`]) and the SBOM ([`sbom`]).
//! 6. Exit `0` (clean), `2` (completed with partial failures), or `1`
//!    (fatal error before scanning).

mod cli;
mod config;
mod correlator;
mod heuristics;
mod models;
mod normalizer;
mod parsers;
mod report;
mod sbom;
mod scan;
mod walker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;

use cli::{Cli, ReportFormat};
use correlator::{Correlator, CorrelatorOutcome, ReqwestTransport};
use models::Ecosystem;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let path = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());
    if !path.is_dir() {
        bail!("not a directory: {}", path.display());
    }

    let mut config = config::load_config(&path, cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        config.scan.concurrency = concurrency;
    }
    let excluded: Vec<Ecosystem> = cli.exclude_ecosystem.iter().map(Into::into).collect();

    if !cli.quiet {
        eprintln!("  {} scanning {}", "→".cyan(), path.display());
    }

    let outcome = scan::scan_repo(&path, &config, &excluded).await?;
    if !cli.quiet {
        eprintln!(
            "  {} {} manifests, {} dependency records",
            "→".cyan(),
            outcome.total_manifests,
            outcome.deps.len()
        );
    }

    let correlated = if cli.online {
        let deadline = cli
            .timeout
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let transport = Arc::new(ReqwestTransport::new()?);
        Correlator::new(transport, config.scan.concurrency, deadline)
            .correlate(&outcome.deps, cli.quiet)
            .await
    } else {
        CorrelatorOutcome::default()
    };

    let commit_hash = walker::commit_hash(&path);

    if !cli.no_sbom {
        let bom = sbom::generate_cyclonedx(&outcome.deps, &path, &commit_hash);
        sbom::save_sbom(&bom, &cli.sbom)?;
        if !cli.quiet {
            eprintln!("  {} SBOM written to {}", "→".cyan(), cli.sbom.display());
        }
    }

    let report = report::build_report(&path, commit_hash, outcome, correlated);
    report::save_report(&report, &cli.output)?;

    match cli.report {
        ReportFormat::Terminal => report::terminal::render(&report, cli.verbose, cli.quiet)?,
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !cli.quiet {
        eprintln!("  {} report written to {}", "→".cyan(), cli.output.display());
    }

    // Partial failures still produce a complete report, but the exit status
    // is advisory so CI can tell degraded coverage from a clean run.
    if report.has_partial_failures() {
        std::process::exit(2);
    }

    Ok(())
}
