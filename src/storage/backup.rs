use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::archive::Chapter;
use crate::codec::{self, DataFormat};

/// Tokens that never belong in a data file
const DENYLIST: &[&str] = &[
    "eval(",
    "Function(",
    "document.",
    "innerHTML",
    "window.",
    "localStorage",
    "sessionStorage",
    "fetch(",
    "XMLHttpRequest",
    "import(",
    "require(",
    "<script",
];

const MODULE_REQUIRED: &[&str] = &["id:", "label:", "slug:", "photos: ["];
const JSON_REQUIRED: &[&str] = &["\"id\"", "\"slug\"", "\"photos\""];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Forbidden content: {token}")]
    Denylisted { token: String },
    #[error("Not a {expected} file")]
    MissingMarker { expected: String },
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind of file offered for restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreKind {
    /// Generated source module
    Module,
    /// JSON document
    Json,
}

impl RestoreKind {
    pub fn format(&self) -> DataFormat {
        match self {
            Self::Module => DataFormat::Source,
            Self::Json => DataFormat::Json,
        }
    }

    fn required_markers(&self) -> &'static [&'static str] {
        match self {
            Self::Module => MODULE_REQUIRED,
            Self::Json => JSON_REQUIRED,
        }
    }

    fn has_prefix(&self, text: &str) -> bool {
        let text = text.trim_start_matches('\u{feff}').trim_start();
        match self {
            Self::Module => text.starts_with(codec::SOURCE_MARKER.trim_end()),
            Self::Json => text.starts_with('{') || text.starts_with('['),
        }
    }
}

impl fmt::Display for RestoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for RestoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photos" | "module" | "source" | "js" => Ok(Self::Module),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown restore kind '{}' (expected module or json)", other)),
        }
    }
}

/// Screen a manually supplied replacement file before it is parsed.
///
/// Checks, in order: denylisted tokens, the expected leading marker, then
/// the required field markers. This is a substring heuristic, not a parse.
pub fn validate_restore_candidate(kind: RestoreKind, text: &str) -> Result<(), ValidationError> {
    if let Some(token) = DENYLIST.iter().find(|token| text.contains(*token)) {
        return Err(ValidationError::Denylisted {
            token: token.to_string(),
        });
    }

    if !kind.has_prefix(text) {
        return Err(ValidationError::MissingMarker {
            expected: kind.to_string(),
        });
    }

    if let Some(field) = kind.required_markers().iter().find(|m| !text.contains(*m)) {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Read a backup file and run it through the guard
pub fn read_restore_candidate(kind: RestoreKind, path: &Path) -> Result<String, RestoreFileError> {
    let text = fs::read_to_string(path)?;
    validate_restore_candidate(kind, &text)?;
    Ok(text)
}

#[derive(Error, Debug)]
pub enum RestoreFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Write both archive files into `dir` under their file names from
/// `source_path` and `json_path`. Returns the written paths.
pub fn export_archive(
    dir: &Path,
    chapters: &[Chapter],
    source_path: &str,
    json_path: &str,
) -> Result<Vec<PathBuf>, BackupError> {
    let archive = codec::serialize(chapters)?;
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (path, text) in [
        (source_path, &archive.source_text),
        (json_path, &archive.json_text),
    ] {
        let name = Path::new(path)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(path));
        let target = dir.join(name);
        fs::write(&target, text)?;
        written.push(target);
    }

    log::info!("Exported {} chapter(s) to {}", chapters.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = r#"export const chapters = [
  {
    id: "lisbon",
    label: "Lisbon",
    slug: "lisbon",
    photos: [],
  },
];
"#;

    #[test]
    fn test_accepts_generated_module() {
        let archive = codec::serialize(&[Chapter::new("Lisbon".into(), None)]).unwrap();
        assert_eq!(
            validate_restore_candidate(RestoreKind::Module, &archive.source_text),
            Ok(())
        );
        assert_eq!(
            validate_restore_candidate(RestoreKind::Json, &archive.json_text),
            Ok(())
        );
        assert_eq!(validate_restore_candidate(RestoreKind::Module, MODULE), Ok(()));
    }

    #[test]
    fn test_names_denylisted_token() {
        let text = MODULE.replace("\"Lisbon\"", "eval(\"1\")");
        assert_eq!(
            validate_restore_candidate(RestoreKind::Module, &text),
            Err(ValidationError::Denylisted {
                token: "eval(".into()
            })
        );

        let text = format!("{}<script>alert(1)</script>", MODULE);
        assert_eq!(
            validate_restore_candidate(RestoreKind::Module, &text),
            Err(ValidationError::Denylisted {
                token: "<script".into()
            })
        );
    }

    #[test]
    fn test_denylist_runs_before_prefix_check() {
        let err = validate_restore_candidate(RestoreKind::Json, "localStorage.clear()").unwrap_err();
        assert!(matches!(err, ValidationError::Denylisted { .. }));
    }

    #[test]
    fn test_missing_photos_marker() {
        let text = MODULE.replace("photos: [],", "pictures: [],");
        assert_eq!(
            validate_restore_candidate(RestoreKind::Module, &text),
            Err(ValidationError::MissingField {
                field: "photos: [".into()
            })
        );
    }

    #[test]
    fn test_wrong_prefix() {
        let err = validate_restore_candidate(RestoreKind::Module, "const photos = [];").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingMarker {
                expected: "module".into()
            }
        );

        let err = validate_restore_candidate(RestoreKind::Json, MODULE).unwrap_err();
        assert!(matches!(err, ValidationError::MissingMarker { .. }));
    }

    #[test]
    fn test_restore_kind_parsing() {
        assert_eq!("photos".parse::<RestoreKind>(), Ok(RestoreKind::Module));
        assert_eq!("JSON".parse::<RestoreKind>(), Ok(RestoreKind::Json));
        assert!("zip".parse::<RestoreKind>().is_err());
    }

    #[test]
    fn test_export_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let chapters = vec![Chapter::new("Lisbon".into(), None)];

        let written = export_archive(
            dir.path(),
            &chapters,
            "src/data/chapters.js",
            "src/data/chapters.json",
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("chapters.js").exists());
        let text = read_restore_candidate(RestoreKind::Json, &dir.path().join("chapters.json")).unwrap();
        assert_eq!(codec::deserialize_json(&text).unwrap(), chapters);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_restore_candidate(RestoreKind::Module, &dir.path().join("nope.js")).unwrap_err();
        assert!(matches!(err, RestoreFileError::Io(_)));
    }
}
