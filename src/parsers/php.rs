use serde_json::Value;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem};

/// Parse `composer.json` — `require` and `require-dev`. Platform entries
/// (`php` itself and `ext-*` extensions) are not packages.
pub fn parse_composer_json(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ParseError::syntax("composer.json", e))?;

    let mut deps = Vec::new();
    for (section, dev) in [("require", false), ("require-dev", true)] {
        let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) else {
            continue;
        };
        for (name, spec) in pkgs {
            if name == "php" || name.starts_with("ext-") || name.starts_with("lib-") {
                continue;
            }
            let mut dep = Dependency::new(
                Ecosystem::Php,
                path,
                name,
                spec.as_str().unwrap_or("*"),
            );
            dep.dev_dependency = dev;
            dep.line_number = find_line(text, &format!("\"{}\"", name));
            deps.push(dep);
        }
    }

    Ok(deps)
}
