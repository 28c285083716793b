use serde_json::Value;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse `package.json` — `dependencies` and `devDependencies`.
///
/// Script blocks are not dependencies; the heuristic engine scans them from
/// the raw manifest text.
pub fn parse_package_json(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ParseError::syntax("package.json", e))?;

    let mut deps = Vec::new();
    for (section, dev) in [("dependencies", false), ("devDependencies", true)] {
        if let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) {
            for (name, spec) in pkgs {
                let spec = spec.as_str().unwrap_or("*");
                let mut dep = Dependency::new(Ecosystem::Npm, path, name, spec);
                dep.dev_dependency = dev;
                dep.line_number = find_line(text, &format!("\"{}\"", name));
                if spec.starts_with("git+") || spec.starts_with("git@") || spec.starts_with("git://")
                {
                    dep.source = SourceKind::Git;
                    dep.resolved_url = Some(spec.to_string());
                } else if spec.starts_with("file:") {
                    dep.source = SourceKind::Path;
                }
                deps.push(dep);
            }
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_json() {
        let json = r#"{
  "name": "my-app",
  "dependencies": {
    "express": "^4.18.2",
    "lodash": "^4.17.21"
  },
  "devDependencies": {
    "jest": "^29.0.0"
  }
}"#;
        let deps = parse_package_json("package.json", json).unwrap();
        assert_eq!(deps.len(), 3);
        let express = deps.iter().find(|d| d.name == "express").unwrap();
        assert_eq!(express.version_spec, "^4.18.2");
        assert!(!express.dev_dependency);
        assert_eq!(express.line_number, Some(4));
        let jest = deps.iter().find(|d| d.name == "jest").unwrap();
        assert!(jest.dev_dependency);
    }

    #[test]
    fn test_git_spec_marks_source() {
        let json = r#"{"dependencies": {"left-pad": "git+https://github.com/x/left-pad.git#v1.3.0"}}"#;
        let deps = parse_package_json("package.json", json).unwrap();
        assert_eq!(deps[0].source, SourceKind::Git);
        assert!(deps[0].resolved_url.as_deref().unwrap().starts_with("git+https"));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        assert!(parse_package_json("package.json", "{ nope").is_err());
    }
}
