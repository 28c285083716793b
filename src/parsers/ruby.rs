use regex::Regex;

use super::ParseError;
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse `Gemfile` — `gem "name", "spec"` lines, with gems inside
/// `group :development` / `group :test` blocks marked as dev dependencies.
pub fn parse_gemfile(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let gem_re = Regex::new(r#"^\s*gem\s+["']([^"']+)["'](?:\s*,\s*["']([^"']+)["'])?"#)
        .map_err(|e| ParseError::syntax("Gemfile", e))?;
    let git_re = Regex::new(r#"(?:git|github):\s*["']([^"']+)["']"#)
        .map_err(|e| ParseError::syntax("Gemfile", e))?;
    let group_re =
        Regex::new(r"^\s*group\s+(.+)\s+do").map_err(|e| ParseError::syntax("Gemfile", e))?;

    let mut deps = Vec::new();
    let mut group_stack: Vec<bool> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if let Some(caps) = group_re.captures(line) {
            let dev = caps[1].contains(":development") || caps[1].contains(":test");
            group_stack.push(dev);
            continue;
        }
        if line.trim() == "end" {
            group_stack.pop();
            continue;
        }

        let Some(caps) = gem_re.captures(line) else {
            continue;
        };
        let name = caps[1].to_string();
        let spec = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "*".to_string());

        let mut dep = Dependency::new(Ecosystem::Ruby, path, name, spec);
        dep.line_number = Some(idx as u32 + 1);
        dep.dev_dependency = group_stack.iter().any(|&dev| dev);
        if let Some(git) = git_re.captures(line) {
            dep.source = SourceKind::Git;
            dep.resolved_url = Some(git[1].to_string());
        }
        deps.push(dep);
    }

    Ok(deps)
}

/// Parse `Gemfile.lock` — pinned `name (version)` entries under `specs:`.
pub fn parse_gemfile_lock(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let spec_re = Regex::new(r"^ {4}([A-Za-z0-9_\-\.]+) \(([^)]+)\)$")
        .map_err(|e| ParseError::syntax("Gemfile.lock", e))?;

    let mut deps = Vec::new();
    let mut in_specs = false;

    for (idx, line) in text.lines().enumerate() {
        if line.trim_end() == "  specs:" {
            in_specs = true;
            continue;
        }
        if in_specs {
            if !line.starts_with("    ") {
                in_specs = false;
                continue;
            }
            if let Some(caps) = spec_re.captures(line) {
                let mut dep = Dependency::new(Ecosystem::Ruby, path, &caps[1], &caps[2]);
                dep.line_number = Some(idx as u32 + 1);
                deps.push(dep);
            }
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gemfile() {
        let text = r#"source "https://rubygems.org"

gem "rails", "~> 7.0.4"
gem "redis"
gem "sidekiq", git: "https://github.com/sidekiq/sidekiq.git"

group :development, :test do
  gem "rspec-rails", "~> 6.0"
end
"#;
        let deps = parse_gemfile("Gemfile", text).unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(deps[0].name, "rails");
        assert_eq!(deps[0].version_spec, "~> 7.0.4");
        assert_eq!(deps[1].version_spec, "*");
        assert_eq!(deps[2].source, SourceKind::Git);
        let rspec = deps.iter().find(|d| d.name == "rspec-rails").unwrap();
        assert!(rspec.dev_dependency);
    }

    #[test]
    fn test_parse_gemfile_lock() {
        let text = r#"GEM
  remote: https://rubygems.org/
  specs:
    concurrent-ruby (1.2.2)
    rails (7.0.4.3)
      actioncable (= 7.0.4.3)

PLATFORMS
  ruby
"#;
        let deps = parse_gemfile_lock("Gemfile.lock", text).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "concurrent-ruby");
        assert_eq!(deps[1].version_spec, "7.0.4.3");
    }
}
