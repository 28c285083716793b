use serde::{Deserialize, Serialize};

/// Build ecosystems with at least one supported manifest grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ecosystem {
    Npm,
    Python,
    Go,
    Rust,
    Java,
    Ruby,
    Php,
    Dotnet,
    Swift,
    R,
    Make,
    Container,
    CiWorkflow,
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Python => "python",
            Ecosystem::Go => "go",
            Ecosystem::Rust => "rust",
            Ecosystem::Java => "java",
            Ecosystem::Ruby => "ruby",
            Ecosystem::Php => "php",
            Ecosystem::Dotnet => "dotnet",
            Ecosystem::Swift => "swift",
            Ecosystem::R => "r",
            Ecosystem::Make => "make",
            Ecosystem::Container => "container",
            Ecosystem::CiWorkflow => "ci-workflow",
        };
        write!(f, "{}", name)
    }
}

/// Where a dependency is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A package registry implied by the ecosystem (npm, PyPI, crates.io, …).
    Registry,
    /// A git URL, bypassing registry integrity guarantees.
    Git,
    /// A filesystem path outside any registry.
    Path,
    /// A local workspace member or vendored copy.
    Local,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Registry => write!(f, "registry"),
            SourceKind::Git => write!(f, "git"),
            SourceKind::Path => write!(f, "path"),
            SourceKind::Local => write!(f, "local"),
        }
    }
}

/// Language-neutral classification of a version spec string.
///
/// The unpinned-version detector keys off this, so the normalizer must keep
/// the categories precise per ecosystem: an npm `^1.2.3` is a `Range`,
/// a Python bare requirement is a `Wildcard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Exact,
    Range,
    Wildcard,
    GitRef,
    PathLocal,
}

/// One dependency declaration at one source location.
///
/// Identity for correlation is `(ecosystem, name, version_spec)`; identity
/// for display is additionally `(manifest_path, line_number)`.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub ecosystem: Ecosystem,
    pub manifest_path: String,
    pub name: String,
    pub version_spec: String,
    pub version_kind: VersionKind,
    pub source: SourceKind,
    pub resolved_url: Option<String>,
    pub dev_dependency: bool,
    pub line_number: Option<u32>,
    pub script_section: bool,
    /// Lockfile integrity string (sha256-/sha512- prefixed), kept for the SBOM.
    pub integrity: Option<String>,
    /// Synthetic record carrying manifest-level findings (named by the
    /// manifest path); excluded from correlation and SBOM output.
    pub manifest_scope: bool,
}

impl Dependency {
    pub fn new(
        ecosystem: Ecosystem,
        manifest_path: impl Into<String>,
        name: impl Into<String>,
        version_spec: impl Into<String>,
    ) -> Self {
        Dependency {
            ecosystem,
            manifest_path: manifest_path.into(),
            name: name.into(),
            version_spec: version_spec.into(),
            version_kind: VersionKind::Exact,
            source: SourceKind::Registry,
            resolved_url: None,
            dev_dependency: false,
            line_number: None,
            script_section: false,
            integrity: None,
            manifest_scope: false,
        }
    }

    /// Coordinate used for vulnerability correlation and caching.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            ecosystem: self.ecosystem,
            name: self.name.clone(),
            version: self.version_spec.clone(),
        }
    }
}

/// The `(ecosystem, name, version)` triple keying feed lookups and caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.ecosystem, self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used by the risk-score aggregation.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.2,
            Severity::Medium => 0.5,
            Severity::High => 0.8,
            Severity::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single static-analysis finding, attached to one dependency record.
/// Append-only within a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: String,
    pub file: String,
    pub line: Option<u32>,
    pub detail: String,
    pub severity: Severity,
}

/// Risk score in [0, 1]: probabilistic OR over the signal weights,
/// `1 − ∏(1 − w)`. Zero signals score 0; one high-severity signal scores
/// 0.8; two mediums compound to 0.75. Weights are sorted before folding so
/// the result cannot depend on detector execution order.
pub fn risk_score(signals: &[Signal]) -> f64 {
    let mut weights: Vec<f64> = signals.iter().map(|s| s.severity.weight()).collect();
    weights.sort_by(|a, b| a.total_cmp(b));
    1.0 - weights.iter().fold(1.0, |acc, w| acc * (1.0 - w))
}

/// A dependency with its evaluated signals and derived score.
#[derive(Debug, Clone)]
pub struct ScoredDependency {
    pub dep: Dependency,
    pub signals: Vec<Signal>,
    pub risk_score: f64,
}

/// A recoverable degradation recorded in the report instead of aborting.
#[derive(Debug, Clone, Serialize)]
pub struct PartialFailure {
    pub stage: String,
    pub subject: String,
    pub note: String,
}

impl PartialFailure {
    pub fn new(stage: &str, subject: impl Into<String>, note: impl Into<String>) -> Self {
        PartialFailure {
            stage: stage.to_string(),
            subject: subject.into(),
            note: note.into(),
        }
    }
}

/// One external-feed vulnerability match, fanned out to a manifest occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct VulnerabilityRecord {
    pub dependency: CoordinateRef,
    pub vulnerability: VulnerabilityInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct VulnerabilityInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub aliases: Vec<String>,
}

/// One CVE-feed record, fanned out to a manifest occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct CveRecord {
    pub dependency: CoordinateRef,
    pub cve: CveInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct CveInfo {
    pub id: String,
    pub description: String,
    pub severity: String,
    pub published: String,
    pub last_modified: String,
}

/// Coordinate plus the manifest occurrence a feed result was attached to.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinateRef {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
    pub manifest_path: String,
}
