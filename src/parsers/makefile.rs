use std::collections::BTreeSet;

use regex::Regex;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem};

/// Parse a `Makefile` — system libraries linked via `-l` flags in
/// LIBS/LDLIBS/LDFLAGS and packages resolved through `pkg-config`.
/// Versions are unknowable from a Makefile, so every entry is a wildcard.
pub fn parse_makefile(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let var_re = Regex::new(r"(?m)^(?:LIBS|LDLIBS|LDFLAGS)\s*[:+?]?=\s*(.+)$")
        .map_err(|e| ParseError::syntax("Makefile", e))?;
    let pkg_re = Regex::new(r"pkg-config\s+--(?:libs|cflags)[a-z\- ]*\s+([A-Za-z0-9_.+\- ]+)")
        .map_err(|e| ParseError::syntax("Makefile", e))?;

    // Standard C runtime libs carry no supply-chain surface worth recording.
    let builtin = ["m", "c", "gcc", "pthread", "dl", "rt"];

    let mut libs: BTreeSet<String> = BTreeSet::new();
    for caps in var_re.captures_iter(text) {
        for part in caps[1].split_whitespace() {
            if let Some(name) = part.strip_prefix("-l") {
                if !name.is_empty() && !name.starts_with('$') && !builtin.contains(&name) {
                    libs.insert(name.to_string());
                }
            }
        }
    }

    let mut pkgs: BTreeSet<String> = BTreeSet::new();
    for caps in pkg_re.captures_iter(text) {
        for pkg in caps[1].split_whitespace() {
            if !pkg.starts_with('-') && !pkg.starts_with('$') {
                pkgs.insert(pkg.trim_end_matches(['`', ')']).to_string());
            }
        }
    }

    let mut deps = Vec::new();
    for name in libs.iter().chain(pkgs.iter()) {
        let mut dep = Dependency::new(Ecosystem::Make, path, name, "*");
        dep.line_number = find_line(text, name);
        deps.push(dep);
    }

    Ok(deps)
}
