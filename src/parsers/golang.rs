use super::ParseError;
use crate::models::{Dependency, Ecosystem};

/// Parse `go.mod` — single-line and block `require` directives. `replace`
/// blocks are skipped; `go.sum` carries checksums, not declarations.
pub fn parse_go_mod(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut deps = Vec::new();
    let mut in_require = false;
    let mut in_replace = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let line_no = idx as u32 + 1;

        if line == "require (" {
            in_require = true;
            continue;
        }
        if line == "replace (" {
            in_replace = true;
            continue;
        }
        if line == ")" {
            in_require = false;
            in_replace = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix("require ") {
            if rest.trim_start().starts_with('(') {
                in_require = true;
                continue;
            }
            push_module(path, rest, line_no, &mut deps);
            continue;
        }

        if in_require && !in_replace && !line.is_empty() && !line.starts_with("//") {
            push_module(path, line, line_no, &mut deps);
        }
    }

    Ok(deps)
}

fn push_module(path: &str, entry: &str, line_no: u32, deps: &mut Vec<Dependency>) {
    let mut parts = entry.split_whitespace();
    let Some(module) = parts.next() else { return };
    let version = parts.next().unwrap_or("latest");

    let mut dep = Dependency::new(Ecosystem::Go, path, module, version);
    dep.line_number = Some(line_no);
    // `// indirect` markers are transitive requirements.
    dep.dev_dependency = false;
    deps.push(dep);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod_block_and_single() {
        let text = r#"module example.com/svc

go 1.21

require github.com/pkg/errors v0.9.1

require (
    github.com/spf13/cobra v1.8.0
    golang.org/x/sync v0.6.0 // indirect
)

replace (
    example.com/fork => ../fork
)
"#;
        let deps = parse_go_mod("go.mod", text).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "github.com/pkg/errors");
        assert_eq!(deps[0].version_spec, "v0.9.1");
        assert_eq!(deps[0].line_number, Some(5));
        assert_eq!(deps[2].name, "golang.org/x/sync");
    }

    #[test]
    fn test_missing_version_defaults_to_latest() {
        let deps = parse_go_mod("go.mod", "require example.com/tool\n").unwrap();
        assert_eq!(deps[0].version_spec, "latest");
    }
}
