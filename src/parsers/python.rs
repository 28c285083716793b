use regex::Regex;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse `requirements.txt` — `name`, `name==1.2.3`, `name>=1.0`, with
/// environment markers after `;` ignored. Bare names are wildcard specs.
pub fn parse_requirements_txt(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let re = Regex::new(r"^([A-Za-z0-9_.\-]+)\s*(?:([<>=~!]+)\s*([0-9A-Za-z_.\-*]+))?")
        .map_err(|e| ParseError::syntax("requirements.txt", e))?;

    let mut deps = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some(caps) = re.captures(line) {
            let name = caps[1].to_string();
            let spec = match (caps.get(2), caps.get(3)) {
                (Some(op), Some(ver)) => format!("{}{}", op.as_str(), ver.as_str()),
                _ => "*".to_string(),
            };
            let mut dep = Dependency::new(Ecosystem::Python, path, name, spec);
            dep.line_number = Some(idx as u32 + 1);
            deps.push(dep);
        }
    }

    Ok(deps)
}

/// Parse `pyproject.toml` — PEP 621 `[project]` dependencies and optional
/// groups, plus the poetry tables including `[tool.poetry.dev-dependencies]`.
pub fn parse_pyproject_toml(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: toml::Value = text
        .parse()
        .map_err(|e| ParseError::syntax("pyproject.toml", e))?;

    let mut deps = Vec::new();

    if let Some(project) = doc.get("project") {
        if let Some(list) = project.get("dependencies").and_then(|v| v.as_array()) {
            for entry in list {
                if let Some(dep) = pep508_dep(path, text, entry.as_str().unwrap_or(""), false) {
                    deps.push(dep);
                }
            }
        }
        if let Some(groups) = project
            .get("optional-dependencies")
            .and_then(|v| v.as_table())
        {
            for (group, list) in groups {
                let is_dev = matches!(
                    group.to_lowercase().as_str(),
                    "dev" | "test" | "testing" | "dev-dependencies"
                );
                for entry in list.as_array().into_iter().flatten() {
                    if let Some(dep) = pep508_dep(path, text, entry.as_str().unwrap_or(""), is_dev)
                    {
                        deps.push(dep);
                    }
                }
            }
        }
    }

    let poetry = doc.get("tool").and_then(|t| t.get("poetry"));
    if let Some(poetry) = poetry {
        for (table, dev) in [
            (poetry.get("dependencies"), false),
            (poetry.get("dev-dependencies"), true),
            (
                poetry
                    .get("group")
                    .and_then(|g| g.get("dev"))
                    .and_then(|d| d.get("dependencies")),
                true,
            ),
        ] {
            let Some(table) = table.and_then(|v| v.as_table()) else {
                continue;
            };
            for (name, value) in table {
                // The `python` entry pins the interpreter, not a package.
                if name == "python" {
                    continue;
                }
                deps.push(poetry_dep(path, text, name, value, dev));
            }
        }
    }

    Ok(deps)
}

fn pep508_dep(path: &str, text: &str, entry: &str, dev: bool) -> Option<Dependency> {
    // Strip environment markers and extras: `requests[socks]>=2.0; python_version<"3.8"`
    let entry = entry.split(';').next().unwrap_or(entry).trim();
    let re = Regex::new(r"^([A-Za-z0-9_.\-]+)(?:\[[^\]]*\])?\s*(.*)$").ok()?;
    let caps = re.captures(entry)?;
    let name = caps[1].to_string();
    let spec = caps[2].trim();
    let spec = if spec.is_empty() { "*" } else { spec };
    let mut dep = Dependency::new(Ecosystem::Python, path, &name, spec);
    dep.dev_dependency = dev;
    dep.line_number = find_line(text, &name);
    Some(dep)
}

/// Poetry specs are either version strings or tables carrying `version`,
/// `git`+`rev`/`tag`/`branch`, or `path`.
fn poetry_dep(path: &str, text: &str, name: &str, value: &toml::Value, dev: bool) -> Dependency {
    let mut dep = Dependency::new(Ecosystem::Python, path, name, "*");
    dep.dev_dependency = dev;
    dep.line_number = find_line(text, name);

    match value {
        toml::Value::String(spec) => dep.version_spec = spec.clone(),
        toml::Value::Table(table) => {
            if let Some(git) = table.get("git").and_then(|v| v.as_str()) {
                dep.source = SourceKind::Git;
                dep.resolved_url = Some(git.to_string());
                dep.version_spec = ["rev", "tag", "branch"]
                    .iter()
                    .find_map(|k| table.get(*k).and_then(|v| v.as_str()))
                    .unwrap_or("*")
                    .to_string();
            } else if let Some(local) = table.get("path").and_then(|v| v.as_str()) {
                dep.source = SourceKind::Path;
                dep.resolved_url = Some(local.to_string());
            } else if let Some(version) = table.get("version").and_then(|v| v.as_str()) {
                dep.version_spec = version.to_string();
            }
        }
        _ => {}
    }

    dep
}

/// Parse `Pipfile.lock` — JSON with pinned versions under `default` and
/// `develop`.
pub fn parse_pipfile_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ParseError::syntax("Pipfile.lock", e))?;

    let mut deps = Vec::new();
    for (section, dev) in [("default", false), ("develop", true)] {
        let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) else {
            continue;
        };
        for (name, info) in pkgs {
            let spec = info
                .get("version")
                .and_then(|v| v.as_str())
                .unwrap_or("*");
            let mut dep = Dependency::new(Ecosystem::Python, path, name, spec);
            dep.dev_dependency = dev;
            deps.push(dep);
        }
    }

    Ok(deps)
}

/// Parse `setup.py` — regex extraction of `install_requires`,
/// `setup_requires`, and `tests_require` lists. Best effort: setup.py is
/// arbitrary code and is never executed here.
pub fn parse_setup_py(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let list_re = Regex::new(
        r"(install_requires|setup_requires|tests_require)\s*=\s*[\[(]([^\])]*)[\])]",
    )
    .map_err(|e| ParseError::syntax("setup.py", e))?;
    let item_re = Regex::new(r#"["']([^"']+)["']"#).map_err(|e| ParseError::syntax("setup.py", e))?;

    let mut deps = Vec::new();
    for caps in list_re.captures_iter(text) {
        let dev = &caps[1] == "tests_require";
        for item in item_re.captures_iter(&caps[2]) {
            if let Some(dep) = pep508_dep(path, text, &item[1], dev) {
                deps.push(dep);
            }
        }
    }

    Ok(deps)
}
