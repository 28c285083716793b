use regex::Regex;

use super::ParseError;
use crate::models::{Dependency, Ecosystem};

/// Split an image reference into `(name, version)`.
///
/// `name@sha256:…` pins by digest; `registry:5000/img:tag` needs the tag
/// colon found after the last slash; a bare name means the mutable `latest`.
pub(crate) fn split_image_ref(image: &str) -> (String, String) {
    if let Some((name, digest)) = image.split_once('@') {
        return (name.to_string(), digest.to_string());
    }
    let slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[slash..].rfind(':') {
        Some(colon) => {
            let colon = slash + colon;
            (image[..colon].to_string(), image[colon + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

/// Parse a `Dockerfile` — each `FROM` line is one dependency whose version
/// is the image tag (or digest). References to earlier build stages are not
/// dependencies.
pub fn parse_dockerfile(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let from_re = Regex::new(r"(?i)^\s*FROM\s+(?:--platform=\S+\s+)?(\S+)(?:\s+AS\s+(\S+))?")
        .map_err(|e| ParseError::syntax("Dockerfile", e))?;

    let mut deps = Vec::new();
    let mut stage_names: Vec<String> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let Some(caps) = from_re.captures(line) else {
            continue;
        };
        let image = caps[1].to_string();
        if let Some(alias) = caps.get(2) {
            stage_names.push(alias.as_str().to_lowercase());
        }
        if image == "scratch" || stage_names.contains(&image.to_lowercase()) {
            continue;
        }

        let (name, version) = split_image_ref(&image);
        let mut dep = Dependency::new(Ecosystem::Container, path, name, version);
        dep.line_number = Some(idx as u32 + 1);
        deps.push(dep);
    }

    Ok(deps)
}

/// Parse a docker-compose file — each service `image:` is one dependency.
pub fn parse_compose(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::syntax("docker-compose", e))?;

    let mut deps = Vec::new();
    let Some(services) = doc.get("services").and_then(|v| v.as_mapping()) else {
        return Ok(deps);
    };

    for (_, service) in services {
        let Some(image) = service.get("image").and_then(|v| v.as_str()) else {
            continue;
        };
        let (name, version) = split_image_ref(image);
        deps.push(Dependency::new(Ecosystem::Container, path, name, version));
    }

    Ok(deps)
}
