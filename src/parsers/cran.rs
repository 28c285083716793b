use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem};

const DEP_FIELDS: [(&str, bool); 5] = [
    ("Depends", false),
    ("Imports", false),
    ("LinkingTo", false),
    ("Suggests", true),
    ("Enhances", true),
];

/// Parse an R package `DESCRIPTION` file — DCF key/value format with
/// indented continuation lines. Dependencies come from Depends/Imports/
/// LinkingTo, with Suggests/Enhances as dev.
pub fn parse_description(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut deps = Vec::new();
    for (field, dev) in DEP_FIELDS {
        let Some((_, value)) = fields.iter().find(|(key, _)| key == field) else {
            continue;
        };
        for entry in value.split(',') {
            let entry = entry.trim();
            // The base language constraint is not a package dependency.
            if entry.is_empty() || entry == "R" || entry.starts_with("R ") || entry.starts_with("R(")
            {
                continue;
            }
            // `pkg (>= 1.0)` or bare `pkg`
            let (name, spec) = match entry.split_once('(') {
                Some((name, rest)) => (
                    name.trim().to_string(),
                    rest.trim_end_matches(')').trim().to_string(),
                ),
                None => (entry.to_string(), "latest".to_string()),
            };
            let mut dep = Dependency::new(Ecosystem::R, path, &name, spec);
            dep.dev_dependency = dev;
            dep.line_number = find_line(text, &name);
            deps.push(dep);
        }
    }

    Ok(deps)
}
