//! Response shapes for the NVD CVE 2.0 feed, queried one identifier at a
//! time.

use serde::Deserialize;
use serde_json::Value;

use crate::models::CveInfo;

pub const CVE_API_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

pub fn cve_url(cve_id: &str) -> String {
    format!("{}?cveId={}", CVE_API_URL, cve_id)
}

#[derive(Debug, Deserialize)]
pub struct NvdResponse {
    #[serde(default)]
    pub vulnerabilities: Vec<NvdEntry>,
}

#[derive(Debug, Deserialize)]
pub struct NvdEntry {
    pub cve: NvdCve,
}

#[derive(Debug, Deserialize)]
pub struct NvdCve {
    pub id: String,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: Value,
    #[serde(default)]
    published: String,
    #[serde(default, rename = "lastModified")]
    last_modified: String,
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

impl NvdCve {
    fn description(&self) -> String {
        self.descriptions
            .iter()
            .find(|d| d.lang == "en")
            .map(|d| d.value.clone())
            .unwrap_or_default()
    }

    /// CVSS base score bucketed the way NVD presents severities, preferring
    /// the newest metric version present.
    fn severity(&self) -> String {
        for version in ["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"] {
            let score = self.metrics[version][0]["cvssData"]["baseScore"].as_f64();
            let Some(score) = score else { continue };
            return if score >= 9.0 {
                "CRITICAL"
            } else if score >= 7.0 {
                "HIGH"
            } else if score >= 4.0 {
                "MEDIUM"
            } else if score >= 0.1 {
                "LOW"
            } else {
                "NONE"
            }
            .to_string();
        }
        "UNKNOWN".to_string()
    }

    pub fn into_info(self) -> CveInfo {
        CveInfo {
            description: self.description(),
            severity: self.severity(),
            published: self.published.clone(),
            last_modified: self.last_modified.clone(),
            id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_bucket_severity() {
        let body = r#"{
  "vulnerabilities": [
    {
      "cve": {
        "id": "CVE-2018-18074",
        "descriptions": [
          {"lang": "es", "value": "malo"},
          {"lang": "en", "value": "The Requests package sends credentials."}
        ],
        "metrics": {
          "cvssMetricV31": [
            {"cvssData": {"baseScore": 9.8}}
          ]
        },
        "published": "2018-10-09T17:29:00",
        "lastModified": "2024-01-01T00:00:00"
      }
    }
  ]
}"#;
        let parsed: NvdResponse = serde_json::from_str(body).unwrap();
        let info = parsed.vulnerabilities.into_iter().next().unwrap().cve.into_info();
        assert_eq!(info.id, "CVE-2018-18074");
        assert_eq!(info.severity, "CRITICAL");
        assert!(info.description.contains("Requests"));
        assert_eq!(info.published, "2018-10-09T17:29:00");
    }

    #[test]
    fn test_missing_metrics_is_unknown() {
        let body = r#"{"vulnerabilities": [{"cve": {"id": "CVE-1"}}]}"#;
        let parsed: NvdResponse = serde_json::from_str(body).unwrap();
        let info = parsed.vulnerabilities.into_iter().next().unwrap().cve.into_info();
        assert_eq!(info.severity, "UNKNOWN");
        assert_eq!(info.description, "");
    }

    #[test]
    fn test_v2_fallback() {
        let body = r#"{"vulnerabilities": [{"cve": {
            "id": "CVE-2",
            "metrics": {"cvssMetricV2": [{"cvssData": {"baseScore": 5.0}}]}
        }}]}"#;
        let parsed: NvdResponse = serde_json::from_str(body).unwrap();
        let info = parsed.vulnerabilities.into_iter().next().unwrap().cve.into_info();
        assert_eq!(info.severity, "MEDIUM");
    }
}
