//! npm-family lockfile parsers. Lockfiles carry pinned exact versions and
//! `resolved` URLs even when the human-edited manifest declares ranges.

use regex::Regex;
use serde_json::Value;

use super::ParseError;
use crate::models::{Dependency, Ecosystem, SourceKind};

fn lock_dep(path: &str, name: &str, version: &str) -> Dependency {
    let mut dep = Dependency::new(Ecosystem::Npm, path, name, version);
    dep.source = SourceKind::Registry;
    dep
}

/// Parse `package-lock.json`. Prefers the v2/v3 `packages` map and falls
/// back to the v1 recursive `dependencies` tree.
pub fn parse_package_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ParseError::syntax("package-lock.json", e))?;

    let mut deps = Vec::new();

    if let Some(packages) = json.get("packages").and_then(|v| v.as_object()) {
        for (pkg_path, info) in packages {
            // The root entry has an empty key.
            if pkg_path.is_empty() {
                continue;
            }
            // "node_modules/@scope/foo" → "@scope/foo"
            let name = pkg_path
                .rsplit_once("node_modules/")
                .map(|(_, n)| n)
                .unwrap_or(pkg_path);
            let version = info.get("version").and_then(|v| v.as_str()).unwrap_or("*");
            let mut dep = lock_dep(path, name, version);
            dep.resolved_url = info
                .get("resolved")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            dep.integrity = info
                .get("integrity")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            deps.push(dep);
        }
        return Ok(deps);
    }

    fn walk_v1(path: &str, tree: &Value, out: &mut Vec<Dependency>) {
        if let Some(map) = tree.as_object() {
            for (name, info) in map {
                let version = info.get("version").and_then(|v| v.as_str()).unwrap_or("*");
                let mut dep = lock_dep(path, name, version);
                dep.resolved_url = info
                    .get("resolved")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                dep.integrity = info
                    .get("integrity")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                out.push(dep);
                if let Some(nested) = info.get("dependencies") {
                    walk_v1(path, nested, out);
                }
            }
        }
    }

    if let Some(tree) = json.get("dependencies") {
        walk_v1(path, tree, &mut deps);
    }

    Ok(deps)
}

/// Parse `yarn.lock` — custom line-based grammar. Each entry opens with an
/// unindented `name@range:` header followed by indented fields.
pub fn parse_yarn_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let header_re = Regex::new(r#"^"?(@?[^@"]+)@"#).map_err(|e| ParseError::syntax("yarn.lock", e))?;
    let field_re = Regex::new(r#"^\s+(version|resolved|integrity)\s+"?([^"\s]+)"?"#)
        .map_err(|e| ParseError::syntax("yarn.lock", e))?;

    let mut deps = Vec::new();
    let mut current: Option<(String, u32)> = None;
    let mut version = String::new();
    let mut resolved = None;
    let mut integrity = None;

    let flush =
        |current: &Option<(String, u32)>, version: &str, resolved: &Option<String>, integrity: &Option<String>, deps: &mut Vec<Dependency>| {
            if let Some((name, line)) = current {
                if !version.is_empty() {
                    let mut dep = lock_dep(path, name, version);
                    dep.line_number = Some(*line);
                    dep.resolved_url = resolved.clone();
                    dep.integrity = integrity.clone();
                    deps.push(dep);
                }
            }
        };

    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('\t') {
            flush(&current, &version, &resolved, &integrity, &mut deps);
            version.clear();
            resolved = None;
            integrity = None;
            // Comma-separated spec lists resolve to one package; take the first.
            let first_spec = line.split(", ").next().unwrap_or(line);
            current = header_re
                .captures(first_spec)
                .map(|caps| (caps[1].to_string(), idx as u32 + 1));
        } else if let Some(caps) = field_re.captures(line) {
            match &caps[1] {
                "version" => version = caps[2].to_string(),
                "resolved" => resolved = Some(caps[2].to_string()),
                "integrity" => integrity = Some(caps[2].to_string()),
                _ => {}
            }
        }
    }
    flush(&current, &version, &resolved, &integrity, &mut deps);

    Ok(deps)
}

/// Parse `pnpm-lock.yaml` — `packages:`/`snapshots:` maps keyed by
/// `/name/version` or `name@version` paths.
pub fn parse_pnpm_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::syntax("pnpm-lock.yaml", e))?;

    let mut deps = Vec::new();
    for section in ["packages", "snapshots"] {
        let Some(map) = doc.get(section).and_then(|v| v.as_mapping()) else {
            continue;
        };
        for (key, info) in map {
            let Some(key) = key.as_str() else { continue };
            let Some((name, version)) = split_pnpm_key(key) else {
                continue;
            };
            let mut dep = lock_dep(path, &name, &version);
            dep.resolved_url = info
                .get("resolution")
                .and_then(|r| r.get("tarball"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            dep.integrity = info
                .get("resolution")
                .and_then(|r| r.get("integrity"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            deps.push(dep);
        }
    }

    Ok(deps)
}

/// `/foo/1.2.3`, `/@scope/foo/1.2.3`, `foo@1.2.3`, `@scope/foo@1.2.3(peer)`.
fn split_pnpm_key(key: &str) -> Option<(String, String)> {
    let key = key.split('(').next().unwrap_or(key);
    if let Some(stripped) = key.strip_prefix('/') {
        let (name, version) = stripped.rsplit_once('/')?;
        return Some((name.to_string(), version.to_string()));
    }
    // `@scope/foo@1.2.3`: split on the last '@' past position zero.
    let at = key.rfind('@').filter(|&i| i > 0)?;
    Some((key[..at].to_string(), key[at + 1..].to_string()))
}
