use serde::Deserialize;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse `Cargo.toml` — `[dependencies]` and `[dev-dependencies]`.
/// Table specs may carry `version`, `git` (+`rev`/`tag`/`branch`), or `path`.
pub fn parse_cargo_toml(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: toml::Value = text.parse().map_err(|e| ParseError::syntax("Cargo.toml", e))?;

    let mut deps = Vec::new();
    for (section, dev) in [("dependencies", false), ("dev-dependencies", true)] {
        let Some(table) = doc.get(section).and_then(|v| v.as_table()) else {
            continue;
        };
        for (name, value) in table {
            let mut dep = Dependency::new(Ecosystem::Rust, path, name, "*");
            dep.dev_dependency = dev;
            dep.line_number = find_line(text, name);

            match value {
                toml::Value::String(version) => dep.version_spec = version.clone(),
                toml::Value::Table(spec) => {
                    if let Some(git) = spec.get("git").and_then(|v| v.as_str()) {
                        dep.source = SourceKind::Git;
                        dep.resolved_url = Some(git.to_string());
                        dep.version_spec = ["rev", "tag", "branch"]
                            .iter()
                            .find_map(|k| spec.get(*k).and_then(|v| v.as_str()))
                            .unwrap_or("*")
                            .to_string();
                    } else if let Some(local) = spec.get("path").and_then(|v| v.as_str()) {
                        dep.source = SourceKind::Path;
                        dep.resolved_url = Some(local.to_string());
                    } else if let Some(version) = spec.get("version").and_then(|v| v.as_str()) {
                        dep.version_spec = version.to_string();
                    }
                }
                _ => {}
            }
            deps.push(dep);
        }
    }

    Ok(deps)
}

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
    /// Packages without a `source` are local workspace members.
    source: Option<String>,
    checksum: Option<String>,
}

/// Parse `Cargo.lock` — pinned versions for every external package.
pub fn parse_cargo_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let lock: CargoLock = toml::from_str(text).map_err(|e| ParseError::syntax("Cargo.lock", e))?;

    let deps = lock
        .package
        .into_iter()
        .filter(|p| p.source.is_some())
        .map(|p| {
            let mut dep = Dependency::new(Ecosystem::Rust, path, &p.name, &p.version);
            let source = p.source.unwrap_or_default();
            if source.starts_with("git+") {
                dep.source = SourceKind::Git;
            }
            dep.resolved_url = Some(source);
            dep.integrity = p.checksum.map(|c| format!("sha256-{}", c));
            dep
        })
        .collect();

    Ok(deps)
}
