//! CycloneDX SBOM output: one deduplicated component per (name, version),
//! each carrying a Package-URL, lockfile hashes when available, and
//! ecosystem properties.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::models::{Ecosystem, ScoredDependency};

pub fn generate_cyclonedx(
    deps: &[ScoredDependency],
    repo_path: &Path,
    commit_hash: &str,
) -> Value {
    let component_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| repo_path.display().to_string());
    let component_version = if commit_hash == "unknown" {
        "latest".to_string()
    } else {
        commit_hash.to_string()
    };

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut components = Vec::new();

    for scored in deps {
        let dep = &scored.dep;
        if dep.manifest_scope {
            continue;
        }
        let key = (dep.name.clone(), dep.version_spec.clone());
        if !seen.insert(key) {
            continue;
        }

        let mut component = json!({
            "type": "library",
            "name": dep.name,
            "version": dep.version_spec,
            "purl": purl(dep.ecosystem, &dep.name, &dep.version_spec),
            "properties": [
                { "name": "ecosystem", "value": dep.ecosystem.to_string() },
                { "name": "dev_dependency", "value": dep.dev_dependency.to_string() },
            ],
        });

        if let Some(hash) = dep.integrity.as_deref().and_then(integrity_hash) {
            component["hashes"] = json!([hash]);
        }
        components.push(component);
    }

    json!({
        "bomFormat": "CycloneDX",
        "specVersion": "1.4",
        "serialNumber": format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        "version": 1,
        "metadata": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "tools": [{
                "vendor": "chainmap",
                "name": "chainmap",
                "version": env!("CARGO_PKG_VERSION"),
            }],
            "component": {
                "type": "application",
                "name": component_name,
                "version": component_version,
            },
        },
        "components": components,
    })
}

/// Package-URL for a dependency coordinate.
pub fn purl(ecosystem: Ecosystem, name: &str, version: &str) -> String {
    let version: String = version
        .chars()
        .filter(|c| !matches!(c, '^' | '~' | '>' | '<' | '=' | ' '))
        .collect();

    match ecosystem {
        Ecosystem::Npm => format!("pkg:npm/{}@{}", name, version),
        Ecosystem::Python => format!("pkg:pypi/{}@{}", name, version),
        Ecosystem::Rust => format!("pkg:cargo/{}@{}", name, version),
        Ecosystem::Go => format!("pkg:golang/{}@{}", name, version),
        Ecosystem::Java => format!("pkg:maven/{}@{}", name.replace(':', "/"), version),
        Ecosystem::Ruby => format!("pkg:gem/{}@{}", name, version),
        Ecosystem::Php => format!("pkg:composer/{}@{}", name, version),
        Ecosystem::Dotnet => format!("pkg:nuget/{}@{}", name, version),
        Ecosystem::Swift => format!("pkg:swift/{}@{}", name, version),
        Ecosystem::R => format!("pkg:cran/{}@{}", name, version),
        Ecosystem::Container => format!("pkg:docker/{}@{}", name, version),
        Ecosystem::Make | Ecosystem::CiWorkflow => {
            format!("pkg:generic/{}/{}@{}", ecosystem, name, version)
        }
    }
}

/// CycloneDX hash object from a lockfile integrity string.
fn integrity_hash(integrity: &str) -> Option<Value> {
    let (alg, content) = if let Some(rest) = integrity.strip_prefix("sha256-") {
        ("SHA-256", rest)
    } else if let Some(rest) = integrity.strip_prefix("sha512-") {
        ("SHA-512", rest)
    } else {
        return None;
    };
    Some(json!({ "alg": alg, "content": content }))
}

pub fn save_sbom(sbom: &Value, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(sbom)?;
    std::fs::write(path, json).with_context(|| format!("writing SBOM to {}", path.display()))?;
    Ok(())
}
