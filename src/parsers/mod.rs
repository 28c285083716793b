//! Manifest parsers, one per format, dispatched by path pattern.
//!
//! Each parser is a pure function from `(relative path, raw text)` to
//! dependency records; parsing never touches the filesystem or the network.
//! A path matching no pattern is not an error — the walker simply skips it.

use thiserror::Error;

use crate::models::{Dependency, Ecosystem};

pub mod cargo;
pub mod ci;
pub mod container;
pub mod cran;
pub mod dotnet;
pub mod golang;
pub mod java;
pub mod lockfiles;
pub mod makefile;
pub mod npm;
pub mod php;
pub mod python;
pub mod ruby;
pub mod swift;

/// One manifest was unreadable or malformed. Recoverable: the scan records
/// it and continues with other files.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed {format}: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },
}

impl ParseError {
    pub fn syntax(format: &'static str, err: impl std::fmt::Display) -> Self {
        ParseError::Syntax {
            format,
            message: err.to_string(),
        }
    }
}

/// The closed set of supported manifest grammars.
///
/// Many kinds map to one ecosystem (both `Cargo.toml` and `Cargo.lock` are
/// `rust`), but each kind owns exactly its own grammar's quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    PackageJson,
    PackageLockJson,
    YarnLock,
    PnpmLock,
    RequirementsTxt,
    PyprojectToml,
    PipfileLock,
    SetupPy,
    GoMod,
    CargoToml,
    CargoLock,
    PomXml,
    Gemfile,
    GemfileLock,
    ComposerJson,
    CsProj,
    PackageSwift,
    RDescription,
    Makefile,
    Dockerfile,
    ComposeFile,
    GithubWorkflow,
    GitlabCi,
}

impl ManifestKind {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ManifestKind::PackageJson
            | ManifestKind::PackageLockJson
            | ManifestKind::YarnLock
            | ManifestKind::PnpmLock => Ecosystem::Npm,
            ManifestKind::RequirementsTxt
            | ManifestKind::PyprojectToml
            | ManifestKind::PipfileLock
            | ManifestKind::SetupPy => Ecosystem::Python,
            ManifestKind::GoMod => Ecosystem::Go,
            ManifestKind::CargoToml | ManifestKind::CargoLock => Ecosystem::Rust,
            ManifestKind::PomXml => Ecosystem::Java,
            ManifestKind::Gemfile | ManifestKind::GemfileLock => Ecosystem::Ruby,
            ManifestKind::ComposerJson => Ecosystem::Php,
            ManifestKind::CsProj => Ecosystem::Dotnet,
            ManifestKind::PackageSwift => Ecosystem::Swift,
            ManifestKind::RDescription => Ecosystem::R,
            ManifestKind::Makefile => Ecosystem::Make,
            ManifestKind::Dockerfile | ManifestKind::ComposeFile => Ecosystem::Container,
            ManifestKind::GithubWorkflow | ManifestKind::GitlabCi => Ecosystem::CiWorkflow,
        }
    }

    /// Extract dependency records from one manifest's raw text.
    pub fn parse(&self, path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
        match self {
            ManifestKind::PackageJson => npm::parse_package_json(path, text),
            ManifestKind::PackageLockJson => lockfiles::parse_package_lock(path, text),
            ManifestKind::YarnLock => lockfiles::parse_yarn_lock(path, text),
            ManifestKind::PnpmLock => lockfiles::parse_pnpm_lock(path, text),
            ManifestKind::RequirementsTxt => python::parse_requirements_txt(path, text),
            ManifestKind::PyprojectToml => python::parse_pyproject_toml(path, text),
            ManifestKind::PipfileLock => python::parse_pipfile_lock(path, text),
            ManifestKind::SetupPy => python::parse_setup_py(path, text),
            ManifestKind::GoMod => golang::parse_go_mod(path, text),
            ManifestKind::CargoToml => cargo::parse_cargo_toml(path, text),
            ManifestKind::CargoLock => cargo::parse_cargo_lock(path, text),
            ManifestKind::PomXml => java::parse_pom_xml(path, text),
            ManifestKind::Gemfile => ruby::parse_gemfile(path, text),
            ManifestKind::GemfileLock => ruby::parse_gemfile_lock(path, text),
            ManifestKind::ComposerJson => php::parse_composer_json(path, text),
            ManifestKind::CsProj => dotnet::parse_csproj(path, text),
            ManifestKind::PackageSwift => swift::parse_package_swift(path, text),
            ManifestKind::RDescription => cran::parse_description(path, text),
            ManifestKind::Makefile => makefile::parse_makefile(path, text),
            ManifestKind::Dockerfile => container::parse_dockerfile(path, text),
            ManifestKind::ComposeFile => container::parse_compose(path, text),
            ManifestKind::GithubWorkflow => ci::parse_github_workflow(path, text),
            ManifestKind::GitlabCi => ci::parse_gitlab_ci(path, text),
        }
    }
}

/// Best-effort line lookup for grammars whose structured parse loses
/// position information (JSON/TOML/XML).
pub(crate) fn find_line(text: &str, needle: &str) -> Option<u32> {
    text.lines()
        .position(|line| line.contains(needle))
        .map(|idx| idx as u32 + 1)
}

/// Map a relative path to the manifest grammar it declares, if any.
///
/// Returning `None` is the expected majority case during a repository walk.
pub fn kind_for_path(rel_path: &str) -> Option<ManifestKind> {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let lower = name.to_lowercase();

    if rel_path.contains(".github/workflows/") && (lower.ends_with(".yml") || lower.ends_with(".yaml"))
    {
        return Some(ManifestKind::GithubWorkflow);
    }

    match name {
        "package.json" => return Some(ManifestKind::PackageJson),
        "package-lock.json" => return Some(ManifestKind::PackageLockJson),
        "yarn.lock" => return Some(ManifestKind::YarnLock),
        "pnpm-lock.yaml" => return Some(ManifestKind::PnpmLock),
        "requirements.txt" => return Some(ManifestKind::RequirementsTxt),
        "pyproject.toml" => return Some(ManifestKind::PyprojectToml),
        "Pipfile.lock" => return Some(ManifestKind::PipfileLock),
        "setup.py" => return Some(ManifestKind::SetupPy),
        "go.mod" => return Some(ManifestKind::GoMod),
        "Cargo.toml" => return Some(ManifestKind::CargoToml),
        "Cargo.lock" => return Some(ManifestKind::CargoLock),
        "pom.xml" => return Some(ManifestKind::PomXml),
        "Gemfile" => return Some(ManifestKind::Gemfile),
        "Gemfile.lock" => return Some(ManifestKind::GemfileLock),
        "composer.json" => return Some(ManifestKind::ComposerJson),
        "Package.swift" => return Some(ManifestKind::PackageSwift),
        "DESCRIPTION" => return Some(ManifestKind::RDescription),
        "Makefile" => return Some(ManifestKind::Makefile),
        ".gitlab-ci.yml" => return Some(ManifestKind::GitlabCi),
        _ => {}
    }

    if lower.ends_with(".mk") {
        return Some(ManifestKind::Makefile);
    }
    if lower.ends_with(".csproj") {
        return Some(ManifestKind::CsProj);
    }
    if lower == "dockerfile" || lower.starts_with("dockerfile.") {
        return Some(ManifestKind::Dockerfile);
    }
    if (lower.starts_with("docker-compose") || lower == "compose.yml" || lower == "compose.yaml")
        && (lower.ends_with(".yml") || lower.ends_with(".yaml"))
    {
        return Some(ManifestKind::ComposeFile);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_known_patterns() {
        assert_eq!(kind_for_path("package.json"), Some(ManifestKind::PackageJson));
        assert_eq!(kind_for_path("a/b/Cargo.lock"), Some(ManifestKind::CargoLock));
        assert_eq!(kind_for_path("svc/Dockerfile.prod"), Some(ManifestKind::Dockerfile));
        assert_eq!(
            kind_for_path(".github/workflows/ci.yml"),
            Some(ManifestKind::GithubWorkflow)
        );
        assert_eq!(kind_for_path("api/Service.csproj"), Some(ManifestKind::CsProj));
        assert_eq!(kind_for_path("build/rules.mk"), Some(ManifestKind::Makefile));
    }

    #[test]
    fn test_unknown_patterns_are_skipped() {
        assert_eq!(kind_for_path("src/main.rs"), None);
        assert_eq!(kind_for_path("README.md"), None);
        assert_eq!(kind_for_path("config.yml"), None);
    }

    #[test]
    fn test_lockfiles_share_ecosystem_with_manifest() {
        assert_eq!(ManifestKind::CargoLock.ecosystem(), Ecosystem::Rust);
        assert_eq!(ManifestKind::CargoToml.ecosystem(), Ecosystem::Rust);
        assert_eq!(ManifestKind::YarnLock.ecosystem(), Ecosystem::Npm);
    }
}
