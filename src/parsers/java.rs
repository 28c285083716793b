use quick_xml::events::Event;
use quick_xml::Reader;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem};

#[derive(Default)]
struct PomDep {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
}

/// Parse `pom.xml` — `<dependencies><dependency>` entries. The record name
/// is `groupId:artifactId`; `<scope>test</scope>` marks a dev dependency.
pub fn parse_pom_xml(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut deps = Vec::new();
    let mut buf = Vec::new();
    let mut in_dependencies = false;
    let mut current: Option<PomDep> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "dependencies" => in_dependencies = true,
                    "dependency" if in_dependencies => current = Some(PomDep::default()),
                    "groupId" | "artifactId" | "version" | "scope" if current.is_some() => {
                        field = Some(tag)
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(dep), Some(field)) = (current.as_mut(), field.as_deref()) {
                    if let Ok(value) = e.unescape() {
                        let value = value.to_string();
                        match field {
                            "groupId" => dep.group_id = Some(value),
                            "artifactId" => dep.artifact_id = Some(value),
                            "version" => dep.version = Some(value),
                            "scope" => dep.scope = Some(value),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "dependencies" => in_dependencies = false,
                    "dependency" => {
                        if let Some(pom) = current.take() {
                            if let (Some(group), Some(artifact)) = (pom.group_id, pom.artifact_id) {
                                let name = format!("{}:{}", group, artifact);
                                let version = pom.version.unwrap_or_else(|| "*".to_string());
                                let mut dep =
                                    Dependency::new(Ecosystem::Java, path, &name, version);
                                dep.dev_dependency = pom.scope.as_deref() == Some("test");
                                dep.line_number = find_line(text, &artifact);
                                deps.push(dep);
                            }
                        }
                    }
                    "groupId" | "artifactId" | "version" | "scope" => field = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::syntax("pom.xml", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pom_xml() {
        let pom = r#"<?xml version="1.0"?>
<project>
  <dependencies>
    <dependency>
      <groupId>org.apache.commons</groupId>
      <artifactId>commons-lang3</artifactId>
      <version>3.12.0</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13.2</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>"#;
        let deps = parse_pom_xml("pom.xml", pom).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "org.apache.commons:commons-lang3");
        assert_eq!(deps[0].version_spec, "3.12.0");
        assert!(!deps[0].dev_dependency);
        assert!(deps[1].dev_dependency);
    }

    #[test]
    fn test_missing_version_is_wildcard() {
        let pom = r#"<project><dependencies><dependency>
          <groupId>g</groupId><artifactId>a</artifactId>
        </dependency></dependencies></project>"#;
        let deps = parse_pom_xml("pom.xml", pom).unwrap();
        assert_eq!(deps[0].version_spec, "*");
    }
}
