use regex::Regex;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse `Package.swift` — `.package(url: "…", from:/exact:/branch:/revision: "…")`
/// entries. The manifest is Swift code; this is pattern extraction, never
/// execution.
pub fn parse_package_swift(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let re = Regex::new(
        r#"\.package\(\s*url:\s*"([^"]+)"(?:\s*,\s*(from|exact|branch|revision|upToNextMajor from):\s*"([^"]+)")?"#,
    )
    .map_err(|e| ParseError::syntax("Package.swift", e))?;

    let mut deps = Vec::new();
    for caps in re.captures_iter(text) {
        let url = caps[1].to_string();
        let name = url
            .rsplit('/')
            .next()
            .unwrap_or(&url)
            .trim_end_matches(".git")
            .to_string();
        let version = caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "latest".to_string());

        let mut dep = Dependency::new(Ecosystem::Swift, path, name, version);
        if url.starts_with("git@") || url.starts_with("git+") {
            dep.source = SourceKind::Git;
        }
        dep.resolved_url = Some(url);
        dep.line_number = find_line(text, ".package(");
        deps.push(dep);
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_swift() {
        let text = r#"
// swift-tools-version:5.7
import PackageDescription

let package = Package(
    name: "App",
    dependencies: [
        .package(url: "https://github.com/vapor/vapor.git", from: "4.76.0"),
        .package(url: "https://github.com/apple/swift-log.git", exact: "1.5.2"),
        .package(url: "https://github.com/corp/internal-kit"),
    ]
)
"#;
        let deps = parse_package_swift("Package.swift", text).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "vapor");
        assert_eq!(deps[0].version_spec, "4.76.0");
        assert_eq!(deps[1].version_spec, "1.5.2");
        assert_eq!(deps[2].version_spec, "latest");
        assert!(deps[2].resolved_url.as_deref().unwrap().contains("internal-kit"));
    }
}
