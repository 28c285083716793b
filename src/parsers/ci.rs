use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem, SourceKind};

/// Parse a GitHub Actions workflow — every third-party `uses:` reference is
/// one dependency whose version is the ref after `@` (branch, tag, or SHA).
/// Local `./` actions are not third-party; `docker://` references are
/// container coordinates.
pub fn parse_github_workflow(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::syntax("workflow", e))?;

    let mut deps = Vec::new();
    let Some(jobs) = doc.get("jobs").and_then(|v| v.as_mapping()) else {
        return Ok(deps);
    };

    for (_, job) in jobs {
        // Reusable workflow call at the job level.
        if let Some(uses) = job.get("uses").and_then(|v| v.as_str()) {
            push_action_ref(path, text, uses, &mut deps);
        }
        let Some(steps) = job.get("steps").and_then(|v| v.as_sequence()) else {
            continue;
        };
        for step in steps {
            if let Some(uses) = step.get("uses").and_then(|v| v.as_str()) {
                push_action_ref(path, text, uses, &mut deps);
            }
        }
    }

    Ok(deps)
}

fn push_action_ref(path: &str, text: &str, uses: &str, deps: &mut Vec<Dependency>) {
    if uses.starts_with("./") {
        return;
    }
    if let Some(image) = uses.strip_prefix("docker://") {
        let (name, version) = super::container::split_image_ref(image);
        let mut dep = Dependency::new(Ecosystem::Container, path, name, version);
        dep.line_number = find_line(text, uses);
        deps.push(dep);
        return;
    }

    let (name, reference) = match uses.split_once('@') {
        Some((name, reference)) => (name.to_string(), reference.to_string()),
        // No ref pins nothing; the action floats on its default branch.
        None => (uses.to_string(), "main".to_string()),
    };
    let mut dep = Dependency::new(Ecosystem::CiWorkflow, path, name, reference);
    dep.source = SourceKind::Registry;
    dep.line_number = find_line(text, uses);
    deps.push(dep);
}

/// Parse `.gitlab-ci.yml` — the global `image:` plus per-job images, all
/// container coordinates.
pub fn parse_gitlab_ci(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::syntax(".gitlab-ci.yml", e))?;

    let mut deps = Vec::new();
    let Some(root) = doc.as_mapping() else {
        return Ok(deps);
    };

    for (key, value) in root {
        if key.as_str() == Some("image") {
            // Global image.
            if let Some(image) = image_name(value) {
                push_image(path, text, &image, &mut deps);
            }
            continue;
        }
        if let Some(image) = value.get("image").and_then(image_name) {
            push_image(path, text, &image, &mut deps);
        }
    }

    Ok(deps)
}

/// GitLab images are either `image: name:tag` or `image: { name: … }`.
fn image_name(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Mapping(_) => value
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

fn push_image(path: &str, text: &str, image: &str, deps: &mut Vec<Dependency>) {
    let (name, version) = super::container::split_image_ref(image);
    let mut dep = Dependency::new(Ecosystem::Container, path, name, version);
    dep.line_number = find_line(text, image);
    deps.push(dep);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_workflow() {
        let text = r#"
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-node@8f152de45cc393bb48ce5d89d36b731f54556e65
      - uses: ./.github/actions/local-setup
      - run: npm test
  release:
    uses: corp/workflows/.github/workflows/release.yml@main
"#;
        let deps = parse_github_workflow(".github/workflows/ci.yml", text).unwrap();
        assert_eq!(deps.len(), 3);
        let checkout = deps.iter().find(|d| d.name == "actions/checkout").unwrap();
        assert_eq!(checkout.version_spec, "v4");
        let node = deps.iter().find(|d| d.name == "actions/setup-node").unwrap();
        assert_eq!(node.version_spec.len(), 40);
        assert!(deps.iter().any(|d| d.version_spec == "main"));
    }

    #[test]
    fn test_docker_uses_becomes_container_coordinate() {
        let text = r#"
jobs:
  scan:
    steps:
      - uses: docker://alpine:3.19
"#;
        let deps = parse_github_workflow(".github/workflows/scan.yml", text).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].ecosystem, Ecosystem::Container);
        assert_eq!(deps[0].name, "alpine");
        assert_eq!(deps[0].version_spec, "3.19");
    }

    #[test]
    fn test_parse_gitlab_ci_images() {
        let text = r#"
image: ruby:3.2

test:
  image: postgres:15
  script:
    - bundle exec rspec

lint:
  script:
    - rubocop
"#;
        let deps = parse_gitlab_ci(".gitlab-ci.yml", text).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "ruby");
        assert_eq!(deps[1].name, "postgres");
        assert!(deps.iter().all(|d| d.ecosystem == Ecosystem::Container));
    }
}
