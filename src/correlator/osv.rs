//! Request and response shapes for the OSV batch vulnerability feed.

use serde::Deserialize;
use serde_json::json;

use crate::models::{Coordinate, Ecosystem};

pub const QUERYBATCH_URL: &str = "https://api.osv.dev/v1/querybatch";

/// OSV's name for an ecosystem, `None` where the feed has no coverage
/// (system libraries, container images, CI actions).
pub fn osv_ecosystem(ecosystem: Ecosystem) -> Option<&'static str> {
    match ecosystem {
        Ecosystem::Npm => Some("npm"),
        Ecosystem::Python => Some("PyPI"),
        Ecosystem::Go => Some("Go"),
        Ecosystem::Rust => Some("crates.io"),
        Ecosystem::Java => Some("Maven"),
        Ecosystem::Ruby => Some("RubyGems"),
        Ecosystem::Php => Some("Packagist"),
        Ecosystem::Dotnet => Some("NuGet"),
        Ecosystem::Swift => Some("SwiftURL"),
        Ecosystem::R => Some("CRAN"),
        Ecosystem::Make | Ecosystem::Container | Ecosystem::CiWorkflow => None,
    }
}

/// Concrete version string the feed expects: Python pins lose the `==`
/// operator, Go modules lose the `v` prefix.
pub fn feed_version(coordinate: &Coordinate) -> String {
    let version = coordinate.version.as_str();
    match coordinate.ecosystem {
        Ecosystem::Python => version.trim_start_matches('=').to_string(),
        Ecosystem::Go => version.trim_start_matches('v').to_string(),
        Ecosystem::Rust => version.trim_start_matches('=').trim().to_string(),
        _ => version.to_string(),
    }
}

/// One `querybatch` request body for a group of coordinates.
pub fn batch_body(coordinates: &[Coordinate]) -> serde_json::Value {
    let queries: Vec<serde_json::Value> = coordinates
        .iter()
        .map(|coordinate| {
            json!({
                "package": {
                    "name": coordinate.name,
                    "ecosystem": osv_ecosystem(coordinate.ecosystem),
                },
                "version": feed_version(coordinate),
            })
        })
        .collect();
    json!({ "queries": queries })
}

#[derive(Debug, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<BatchResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub vulns: Vec<OsvVuln>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsvVuln {
    pub id: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl OsvVuln {
    /// CVE identifiers carried by this vulnerability (aliases, or the id
    /// itself when the feed entry is the CVE).
    pub fn cve_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .aliases
            .iter()
            .filter(|alias| alias.starts_with("CVE-"))
            .cloned()
            .collect();
        if self.id.starts_with("CVE-") {
            ids.push(self.id.clone());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_body_shape() {
        let coordinates = vec![Coordinate {
            ecosystem: Ecosystem::Python,
            name: "requests".to_string(),
            version: "==2.19.1".to_string(),
        }];
        let body = batch_body(&coordinates);
        assert_eq!(body["queries"][0]["package"]["ecosystem"], "PyPI");
        assert_eq!(body["queries"][0]["version"], "2.19.1");
    }

    #[test]
    fn test_parse_batch_response() {
        let body = r#"{
  "results": [
    {},
    {"vulns": [{"id": "GHSA-x4qr", "summary": "bad", "aliases": ["CVE-2018-18074"]}]}
  ]
}"#;
        let parsed: BatchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.results[0].vulns.is_empty());
        assert_eq!(parsed.results[1].vulns[0].cve_ids(), vec!["CVE-2018-18074"]);
    }

    #[test]
    fn test_uncovered_ecosystems() {
        assert!(osv_ecosystem(Ecosystem::Container).is_none());
        assert!(osv_ecosystem(Ecosystem::Make).is_none());
    }
}
