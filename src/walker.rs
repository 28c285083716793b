use std::path::Path;
use std::process::Command;

use walkdir::WalkDir;

use crate::parsers::{kind_for_path, ManifestKind};

/// One manifest file surfaced by the walk: relative path, detected grammar,
/// and the raw text handed to the parser.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub rel_path: String,
    pub kind: ManifestKind,
    pub text: String,
}

/// Walk the repository and collect every file matching a known manifest
/// pattern, pruning ignored directories. Files that are not valid UTF-8 are
/// skipped with a warning. The result is sorted by path so downstream
/// output is deterministic.
pub fn walk_repo(root: &Path, ignore_dirs: &[String]) -> Vec<ManifestFile> {
    let mut manifests = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        match entry.file_name().to_str() {
            Some(name) => !ignore_dirs.iter().any(|d| d == name),
            None => false,
        }
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        let Some(kind) = kind_for_path(&rel_path) else {
            continue;
        };
        match std::fs::read_to_string(entry.path()) {
            Ok(text) => manifests.push(ManifestFile {
                rel_path,
                kind,
                text,
            }),
            Err(err) => log::warn!("skipping unreadable manifest {}: {}", rel_path, err),
        }
    }

    manifests.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    manifests
}

/// Short commit hash of the scanned repository, `"unknown"` outside git.
pub fn commit_hash(root: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let hash = String::from_utf8_lossy(&out.stdout);
            hash.trim().chars().take(8).collect()
        }
        _ => "unknown".to_string(),
    }
}
