//! Folds ecosystem-specific version grammar into the canonical
//! [`VersionKind`] classification. The unpinned-version detector depends on
//! this being precise per ecosystem: a Python `*` and an npm `^1.2.3` sit in
//! different risk tiers and must not collapse into one bucket.

use crate::models::{Dependency, Ecosystem, SourceKind, VersionKind};

/// Canonicalize one freshly parsed record in place.
pub fn normalize(dep: &mut Dependency) {
    dep.version_spec = dep.version_spec.trim().to_string();

    let spec = dep.version_spec.as_str();
    if spec.starts_with("git+") || spec.starts_with("git@") || spec.starts_with("git://") {
        dep.source = SourceKind::Git;
    }

    dep.version_kind = match dep.source {
        SourceKind::Git => VersionKind::GitRef,
        SourceKind::Path | SourceKind::Local => VersionKind::PathLocal,
        SourceKind::Registry => classify(dep.ecosystem, spec),
    };
}

fn classify(ecosystem: Ecosystem, spec: &str) -> VersionKind {
    if spec.is_empty() || spec == "*" || spec.eq_ignore_ascii_case("latest") {
        return VersionKind::Wildcard;
    }

    match ecosystem {
        Ecosystem::Npm => classify_npm(spec),
        Ecosystem::Python => classify_python(spec),
        Ecosystem::Go => VersionKind::Exact,
        Ecosystem::Rust => classify_rust(spec),
        Ecosystem::Java => classify_java(spec),
        Ecosystem::Ruby => classify_ruby(spec),
        Ecosystem::Php => classify_php(spec),
        Ecosystem::Dotnet => classify_dotnet(spec),
        Ecosystem::Swift | Ecosystem::R | Ecosystem::Make => classify_generic(spec),
        Ecosystem::Container => classify_container(spec),
        Ecosystem::CiWorkflow => classify_ci_ref(spec),
    }
}

fn classify_npm(spec: &str) -> VersionKind {
    if spec.starts_with('^')
        || spec.starts_with('~')
        || spec.contains("||")
        || spec.contains(" - ")
        || spec.contains('>')
        || spec.contains('<')
        || spec.split('.').any(|part| part == "x" || part == "X" || part == "*")
    {
        VersionKind::Range
    } else if spec.starts_with("file:") {
        VersionKind::PathLocal
    } else {
        VersionKind::Exact
    }
}

fn classify_python(spec: &str) -> VersionKind {
    if let Some(rest) = spec.strip_prefix("==") {
        // `==1.*` is still a range in PEP 440.
        if rest.contains('*') {
            VersionKind::Range
        } else {
            VersionKind::Exact
        }
    } else if spec.starts_with(['>', '<', '~', '!']) {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_rust(spec: &str) -> VersionKind {
    if let Some(rest) = spec.strip_prefix('=') {
        return if rest.trim().is_empty() {
            VersionKind::Wildcard
        } else {
            VersionKind::Exact
        };
    }
    if spec.starts_with(['^', '~', '>', '<']) || spec.contains('*') || spec.contains(',') {
        return VersionKind::Range;
    }
    // A bare full triple reads as a pin; shorter forms are caret ranges.
    if spec.split('.').count() >= 3 {
        VersionKind::Exact
    } else {
        VersionKind::Range
    }
}

fn classify_java(spec: &str) -> VersionKind {
    if spec.contains("${") {
        // Property reference resolved elsewhere in the POM hierarchy.
        VersionKind::Range
    } else if spec.starts_with(['[', '(']) {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_ruby(spec: &str) -> VersionKind {
    let compact: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == ">=0" {
        return VersionKind::Wildcard;
    }
    if compact.starts_with("~>") || compact.starts_with(['>', '<', '!']) || compact.contains(',') {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_php(spec: &str) -> VersionKind {
    if spec.starts_with("dev-") || spec.ends_with("-dev") {
        return VersionKind::Wildcard;
    }
    if spec.starts_with(['^', '~', '>', '<'])
        || spec.contains('*')
        || spec.contains("||")
        || spec.contains('|')
    {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_dotnet(spec: &str) -> VersionKind {
    if spec.starts_with(['[', '(']) || spec.contains('*') {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_generic(spec: &str) -> VersionKind {
    if spec.starts_with(['>', '<', '~', '^']) {
        VersionKind::Range
    } else {
        VersionKind::Exact
    }
}

fn classify_container(_spec: &str) -> VersionKind {
    // Digest pins and named tags both read as deliberate; `latest` and the
    // empty tag were caught above.
    VersionKind::Exact
}

/// CI refs: a 40-hex SHA is immutable; a branch name floats; anything else
/// is a mutable tag.
fn classify_ci_ref(spec: &str) -> VersionKind {
    if is_commit_sha(spec) {
        VersionKind::Exact
    } else if matches!(spec, "main" | "master" | "HEAD") {
        VersionKind::Wildcard
    } else {
        VersionKind::Range
    }
}

pub fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}
