//! The individual risk detectors. Each is a pure function of one dependency
//! record (real or manifest-scoped) and the owning manifest's raw text.

use anyhow::Result;
use regex::Regex;
use serde_json::Value;

use crate::models::{Dependency, Ecosystem, Severity, Signal, VersionKind};
use crate::normalizer::is_commit_sha;

fn signal(dep: &Dependency, signal_type: &str, detail: String, severity: Severity) -> Signal {
    Signal {
        signal_type: signal_type.to_string(),
        file: dep.manifest_path.clone(),
        line: dep.line_number,
        detail,
        severity,
    }
}

/// Script fields that run at install time, per manifest grammar.
fn install_scripts(dep: &Dependency, text: &str) -> Vec<(String, String)> {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    let Some(scripts) = json.get("scripts").and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    let keys: &[&str] = match dep.ecosystem {
        Ecosystem::Npm => &["preinstall", "install", "postinstall", "prepare", "prepublish"],
        Ecosystem::Php => &["pre-install-cmd", "post-install-cmd", "pre-update-cmd", "post-update-cmd"],
        _ => return Vec::new(),
    };

    let mut out = Vec::new();
    for key in keys {
        match scripts.get(*key) {
            Some(Value::String(cmd)) => out.push((key.to_string(), cmd.clone())),
            Some(Value::Array(cmds)) => {
                for cmd in cmds.iter().filter_map(|v| v.as_str()) {
                    out.push((key.to_string(), cmd.to_string()));
                }
            }
            _ => {}
        }
    }
    out
}

/// Install/postinstall scripts that download or hand code to an
/// interpreter; piping straight into a shell escalates to high.
pub(super) fn postinstall_script(dep: &Dependency, text: &str) -> Result<Vec<Signal>> {
    let downloader = Regex::new(r"(curl|wget|bash\s+-c|python\s+-c|node\s+-e)")?;
    let pipe_to_shell = Regex::new(r"\|\s*(sh|bash)\b")?;

    let mut signals = Vec::new();
    for (key, cmd) in install_scripts(dep, text) {
        if !downloader.is_match(&cmd) && !pipe_to_shell.is_match(&cmd) {
            continue;
        }
        let severity = if pipe_to_shell.is_match(&cmd) {
            Severity::High
        } else {
            Severity::Medium
        };
        signals.push(signal(
            dep,
            "postinstall_script",
            format!("{} script runs: {}", key, cmd),
            severity,
        ));
    }
    Ok(signals)
}

/// Long base64-charset runs in the manifest, or eval-style invocation in
/// script fields. Medium on its own, high when both co-occur.
pub(super) fn obfuscated_content(dep: &Dependency, text: &str) -> Result<Vec<Signal>> {
    let base64_run = Regex::new(r"[A-Za-z0-9+/=]{120,}")?;
    let eval_call = Regex::new(r"(\beval\s*\(|new\s+Function\s*\(|\batob\s*\(|base64\s+(-d|--decode))")?;

    let has_base64 = base64_run.is_match(text);
    let has_eval = install_scripts(dep, text)
        .iter()
        .any(|(_, cmd)| eval_call.is_match(cmd));

    let mut signals = Vec::new();
    match (has_base64, has_eval) {
        (true, true) => signals.push(signal(
            dep,
            "obfuscated_content",
            "encoded payload and eval-style invocation in script fields".to_string(),
            Severity::High,
        )),
        (true, false) => signals.push(signal(
            dep,
            "obfuscated_content",
            "long base64-charset run in manifest".to_string(),
            Severity::Medium,
        )),
        (false, true) => signals.push(signal(
            dep,
            "obfuscated_content",
            "eval-style invocation in script fields".to_string(),
            Severity::Medium,
        )),
        (false, false) => {}
    }
    Ok(signals)
}

/// Git sources bypass registry integrity and signature guarantees.
pub(super) fn git_dependency(dep: &Dependency, _text: &str) -> Result<Vec<Signal>> {
    if dep.version_kind != VersionKind::GitRef {
        return Ok(Vec::new());
    }
    let url = dep
        .resolved_url
        .as_deref()
        .unwrap_or(dep.version_spec.as_str());
    Ok(vec![signal(
        dep,
        "git_dependency",
        format!("{} fetched from git ({})", dep.name, url),
        Severity::Medium,
    )])
}

/// Wildcard/latest/empty version specs. High for production dependencies,
/// medium for dev-only. Container images and CI actions have their own
/// pinning detectors.
pub(super) fn unpinned_version(dep: &Dependency, _text: &str) -> Result<Vec<Signal>> {
    if dep.version_kind != VersionKind::Wildcard
        || matches!(dep.ecosystem, Ecosystem::Container | Ecosystem::CiWorkflow)
    {
        return Ok(Vec::new());
    }
    let severity = if dep.dev_dependency {
        Severity::Medium
    } else {
        Severity::High
    };
    Ok(vec![signal(
        dep,
        "unpinned_version",
        format!("{} has no pinned version ({:?})", dep.name, dep.version_spec),
        severity,
    )])
}

/// Container risks: an unpinned base image (high) on image records, and
/// dangerous RUN commands (medium) on the manifest itself.
pub(super) fn container_risk(dep: &Dependency, text: &str) -> Result<Vec<Signal>> {
    if dep.ecosystem != Ecosystem::Container {
        return Ok(Vec::new());
    }

    if !dep.manifest_scope {
        if dep.version_kind == VersionKind::Wildcard {
            return Ok(vec![signal(
                dep,
                "container_risk",
                format!("base image {} uses a mutable latest tag", dep.name),
                Severity::High,
            )]);
        }
        return Ok(Vec::new());
    }

    let run_line = Regex::new(r"(?i)^\s*RUN\s+(.+)$")?;
    let dangerous =
        Regex::new(r"(?i)((curl|wget)[^|]*\|\s*(sh|bash)\b|chmod\s+777|curl\s+(-k|--insecure))")?;

    let mut signals = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let Some(caps) = run_line.captures(line) else {
            continue;
        };
        if dangerous.is_match(&caps[1]) {
            let mut s = signal(
                dep,
                "container_risk",
                format!("RUN command: {}", caps[1].trim()),
                Severity::Medium,
            );
            s.line = Some(idx as u32 + 1);
            signals.push(s);
        }
    }
    Ok(signals)
}

/// Native build steps or prebuilt binary artifact references. Informational:
/// it widens scrutiny rather than marking a defect.
pub(super) fn native_module(dep: &Dependency, text: &str) -> Result<Vec<Signal>> {
    if dep.ecosystem == Ecosystem::Make {
        return Ok(Vec::new());
    }
    let marker =
        Regex::new(r#"(node-gyp|binding\.gyp|"gypfile"|prebuild-install|\.(node|so|dylib)["'])"#)?;
    let Some(found) = marker.find(text) else {
        return Ok(Vec::new());
    };
    Ok(vec![signal(
        dep,
        "native_module",
        format!("native build or binary artifact marker: {}", found.as_str()),
        Severity::Medium,
    )])
}

/// Third-party CI action pinned by mutable tag or branch instead of a full
/// commit SHA.
pub(super) fn unpinned_ci_action(dep: &Dependency, _text: &str) -> Result<Vec<Signal>> {
    if dep.ecosystem != Ecosystem::CiWorkflow || is_commit_sha(&dep.version_spec) {
        return Ok(Vec::new());
    }
    let kind = if dep.version_kind == VersionKind::Wildcard {
        "branch"
    } else {
        "mutable tag"
    };
    Ok(vec![signal(
        dep,
        "unpinned_ci_action",
        format!("{}@{} is a {}, not a commit SHA", dep.name, dep.version_spec, kind),
        Severity::Medium,
    )])
}
