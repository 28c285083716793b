//! The finalized scan report: built incrementally, finalized once, then
//! handed to a renderer. The JSON field names and nesting are a contract
//! with downstream consumers and must not drift.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::correlator::CorrelatorOutcome;
use crate::models::{
    CveRecord, Ecosystem, PartialFailure, ScoredDependency, Signal, SourceKind,
    VulnerabilityRecord,
};
use crate::scan::ScanOutcome;

pub mod terminal;

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub repo: RepoInfo,
    pub scan_summary: ScanSummary,
    pub dependencies: Vec<DependencyEntry>,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub cves: Vec<CveRecord>,
    pub partial_failures: Vec<PartialFailure>,
}

#[derive(Debug, Serialize)]
pub struct RepoInfo {
    pub path: String,
    pub commit_hash: String,
    pub scan_date: String,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub total_manifests: usize,
    pub ecosystems_detected: Vec<Ecosystem>,
    pub total_dependencies: usize,
    pub total_signals: usize,
    pub total_vulnerabilities: usize,
    pub total_cves: usize,
}

#[derive(Debug, Serialize)]
pub struct DependencyEntry {
    pub ecosystem: Ecosystem,
    pub manifest_path: String,
    pub dependency: PackageInfo,
    pub metadata: DependencyMetadata,
    pub signals: Vec<Signal>,
    pub risk_score: f64,
}

#[derive(Debug, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub source: SourceKind,
    pub resolved: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DependencyMetadata {
    pub dev_dependency: bool,
    pub line_number: Option<u32>,
    pub script_section: bool,
}

/// Assemble the aggregate root. Immutable once returned.
pub fn build_report(
    repo_path: &Path,
    commit_hash: String,
    scan: ScanOutcome,
    correlated: CorrelatorOutcome,
) -> ScanReport {
    let dependencies: Vec<DependencyEntry> = scan.deps.into_iter().map(dependency_entry).collect();
    let total_signals = dependencies.iter().map(|d| d.signals.len()).sum();

    let mut partial_failures = scan.failures;
    partial_failures.extend(correlated.failures);

    ScanReport {
        repo: RepoInfo {
            path: repo_path.display().to_string(),
            commit_hash,
            scan_date: chrono::Utc::now().to_rfc3339(),
        },
        scan_summary: ScanSummary {
            total_manifests: scan.total_manifests,
            ecosystems_detected: scan.ecosystems.into_iter().collect(),
            total_dependencies: dependencies.len(),
            total_signals,
            total_vulnerabilities: correlated.vulnerabilities.len(),
            total_cves: correlated.cves.len(),
        },
        dependencies,
        vulnerabilities: correlated.vulnerabilities,
        cves: correlated.cves,
        partial_failures,
    }
}

fn dependency_entry(scored: ScoredDependency) -> DependencyEntry {
    let dep = scored.dep;
    DependencyEntry {
        ecosystem: dep.ecosystem,
        manifest_path: dep.manifest_path,
        dependency: PackageInfo {
            name: dep.name,
            version: dep.version_spec,
            source: dep.source,
            resolved: dep.resolved_url,
        },
        metadata: DependencyMetadata {
            dev_dependency: dep.dev_dependency,
            line_number: dep.line_number,
            script_section: dep.script_section,
        },
        signals: scored.signals,
        risk_score: scored.risk_score,
    }
}

/// Whether the run degraded anywhere; drives the advisory exit status.
impl ScanReport {
    pub fn has_partial_failures(&self) -> bool {
        !self.partial_failures.is_empty()
    }
}

pub fn save_report(report: &ScanReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Severity};
    use std::collections::BTreeSet;

    fn sample_report() -> ScanReport {
        let mut dep = Dependency::new(Ecosystem::Python, "requirements.txt", "requests", "*");
        dep.line_number = Some(1);
        let scored = ScoredDependency {
            signals: vec![Signal {
                signal_type: "unpinned_version".to_string(),
                file: "requirements.txt".to_string(),
                line: Some(1),
                detail: "requests has no pinned version".to_string(),
                severity: Severity::High,
            }],
            risk_score: 0.8,
            dep,
        };
        let scan = ScanOutcome {
            total_manifests: 1,
            ecosystems: BTreeSet::from([Ecosystem::Python]),
            deps: vec![scored],
            failures: Vec::new(),
        };
        build_report(
            Path::new("/repo"),
            "abcd1234".to_string(),
            scan,
            CorrelatorOutcome::default(),
        )
    }

    #[test]
    fn test_report_json_contract() {
        let report = sample_report();
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();

        assert_eq!(json["repo"]["commit_hash"], "abcd1234");
        assert!(json["repo"]["scan_date"].is_string());
        assert_eq!(json["scan_summary"]["total_manifests"], 1);
        assert_eq!(json["scan_summary"]["ecosystems_detected"][0], "python");
        assert_eq!(json["scan_summary"]["total_dependencies"], 1);
        assert_eq!(json["scan_summary"]["total_signals"], 1);

        let entry = &json["dependencies"][0];
        assert_eq!(entry["ecosystem"], "python");
        assert_eq!(entry["manifest_path"], "requirements.txt");
        assert_eq!(entry["dependency"]["name"], "requests");
        assert_eq!(entry["dependency"]["version"], "*");
        assert_eq!(entry["dependency"]["source"], "registry");
        assert!(entry["dependency"]["resolved"].is_null());
        assert_eq!(entry["metadata"]["dev_dependency"], false);
        assert_eq!(entry["metadata"]["line_number"], 1);
        assert_eq!(entry["metadata"]["script_section"], false);
        assert_eq!(entry["signals"][0]["type"], "unpinned_version");
        assert_eq!(entry["signals"][0]["severity"], "high");
        assert!((entry["risk_score"].as_f64().unwrap() - 0.8).abs() < 1e-9);

        assert!(json["vulnerabilities"].as_array().unwrap().is_empty());
        assert!(json["cves"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_save_report_round_trips(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        save_report(&sample_report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"unpinned_version\""));
    }
}
