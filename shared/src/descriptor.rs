//! Reading the candidate version out of an update descriptor.
//!
//! The descriptor is the XML document served by the update server:
//!
//! ```xml
//! <updates>
//!   <update type="minor" version="31.2.0" appVersion="31.2.0" .../>
//! </updates>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Returns the `version` attribute of the first element carrying one, in
/// document order. Empty when there is none or the document does not parse.
pub fn parse_candidate_version(raw: &str) -> String {
    let mut reader = Reader::from_str(raw);
    let mut found: Option<String> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                if found.is_none() {
                    match version_attribute(e) {
                        Ok(v) => found = v,
                        Err(reason) => return undecodable(&reason),
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if found.is_none() {
                    match version_attribute(e) {
                        Ok(v) => found = v,
                        Err(reason) => return undecodable(&reason),
                    }
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Descriptor is not well-formed: {}", e);
                return String::new();
            }
            _ => {}
        }
    }

    if depth != 0 {
        tracing::debug!("Descriptor ends with {} unclosed element(s)", depth);
        return String::new();
    }
    found.unwrap_or_default()
}

/// `Ok(None)` when the element has no `version` attribute, `Err` when it has
/// one that cannot be decoded.
fn version_attribute(e: &BytesStart<'_>) -> Result<Option<String>, String> {
    let attr = match e.try_get_attribute("version") {
        Ok(Some(attr)) => attr,
        Ok(None) => return Ok(None),
        Err(err) => return Err(err.to_string()),
    };
    let raw = std::str::from_utf8(&attr.value).map_err(|err| err.to_string())?;
    let value = quick_xml::escape::unescape(raw).map_err(|err| err.to_string())?;
    Ok(Some(value.into_owned()))
}

fn undecodable(reason: &str) -> String {
    tracing::debug!("First version attribute cannot be decoded: {}", reason);
    String::new()
}

/// Leading dot-delimited component of a version string.
pub fn major_component(version: &str) -> &str {
    version.trim().split('.').next().unwrap_or("").trim()
}

/// Whether two versions share their major component, compared as text.
pub fn same_major(a: &str, b: &str) -> bool {
    major_component(a) == major_component(b)
}
