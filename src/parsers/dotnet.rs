use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{find_line, ParseError};
use crate::models::{Dependency, Ecosystem};

/// Parse a `.csproj` project file — `<PackageReference Include= Version=>`
/// items (both self-closing and paired forms).
pub fn parse_csproj(path: &str, text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut deps = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.name().local_name().as_ref() == b"PackageReference" {
                    if let Some(dep) = package_reference(path, text, e) {
                        deps.push(dep);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::syntax("csproj", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(deps)
}

fn package_reference(path: &str, text: &str, e: &BytesStart<'_>) -> Option<Dependency> {
    let mut name = None;
    let mut version = None;
    for attr in e.attributes().flatten() {
        let key = attr.key.local_name();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match key.as_ref() {
            b"Include" => name = Some(value),
            b"Version" | b"VersionOverride" => version = Some(value),
            _ => {}
        }
    }
    let name = name?;
    let mut dep = Dependency::new(
        Ecosystem::Dotnet,
        path,
        &name,
        version.unwrap_or_else(|| "*".to_string()),
    );
    dep.line_number = find_line(text, &name);
    Some(dep)
}
