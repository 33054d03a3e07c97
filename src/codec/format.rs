//! The two persisted renditions of the archive.
//!
//! The source module is the canonical write target: a data literal assigned
//! to `chapters`, readable in the repository history. The JSON document holds
//! the same records and is the fallback that is always parseable. Both carry
//! [`FORMAT_VERSION`]; a file stamped with a newer version was written by a
//! newer deployment.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::archive::{normalize_chapters_value, Chapter};

use super::literal::{parse_literal, skip_trivia, write_literal};
use super::ParseError;

/// Version of the persisted layout this build reads and writes
pub const FORMAT_VERSION: u32 = 1;

/// Every generated source module starts with this line prefix
pub const SOURCE_MARKER: &str = "export const chapters = ";

/// Closes the data literal
pub const SOURCE_TERMINATOR: &str = ";";

/// Which rendition a piece of text is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Source,
    Json,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerializedArchive {
    pub source_text: String,
    pub json_text: String,
}

pub fn serialize(chapters: &[Chapter]) -> Result<SerializedArchive, serde_json::Error> {
    let tree = serde_json::to_value(chapters)?;

    let mut source_text = String::from(SOURCE_MARKER);
    write_literal(&tree, 0, &mut source_text);
    source_text.push_str(SOURCE_TERMINATOR);
    source_text.push_str(&format!("\n\nexport const FORMAT_VERSION = {};\n", FORMAT_VERSION));

    let document = json!({
        "formatVersion": FORMAT_VERSION,
        "chapters": tree,
    });
    let mut json_text = serde_json::to_string_pretty(&document)?;
    json_text.push('\n');

    Ok(SerializedArchive {
        source_text,
        json_text,
    })
}

pub fn deserialize(format: DataFormat, text: &str) -> Result<Vec<Chapter>, ParseError> {
    match format {
        DataFormat::Source => deserialize_source(text),
        DataFormat::Json => deserialize_json(text),
    }
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"export\s+const\s+chapters\s*=\s*").expect("valid marker pattern"))
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"export\s+const\s+FORMAT_VERSION\s*=\s*([^\s;]+)").expect("valid version pattern")
    })
}

/// Parse the source module. The literal is read by a data-only grammar, so a
/// tampered file can fail to parse but can never run anything.
pub fn deserialize_source(text: &str) -> Result<Vec<Chapter>, ParseError> {
    let marker = marker_regex().find(text).ok_or(ParseError::MissingMarker)?;
    let (tree, end) = parse_literal(text, marker.end())?;

    let after = skip_trivia(text, end)?;
    if !text[after..].starts_with(SOURCE_TERMINATOR) {
        return Err(ParseError::MissingTerminator { offset: after });
    }

    // Files written before versioning are version 1
    let version = match version_regex().captures(&text[after..]).and_then(|caps| caps.get(1)) {
        Some(m) => m
            .as_str()
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidVersion(m.as_str().to_string()))?,
        None => 1,
    };
    check_version(version)?;

    normalize_chapters_value(tree).map_err(ParseError::Records)
}

/// Parse the JSON document. A bare array is the layout used before the
/// document carried a version.
pub fn deserialize_json(text: &str) -> Result<Vec<Chapter>, ParseError> {
    let document: Value = serde_json::from_str(text)?;

    let chapters = match document {
        Value::Array(_) => document,
        Value::Object(mut map) => {
            let version = match map.get("formatVersion") {
                Some(v) => v
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| ParseError::InvalidVersion(v.to_string()))?,
                None => 1,
            };
            check_version(version)?;
            map.remove("chapters").unwrap_or(Value::Null)
        }
        other => other,
    };

    normalize_chapters_value(chapters).map_err(ParseError::Records)
}

fn check_version(found: u32) -> Result<(), ParseError> {
    if found > FORMAT_VERSION {
        return Err(ParseError::UnsupportedVersion {
            found,
            supported: FORMAT_VERSION,
        });
    }
    Ok(())
}
