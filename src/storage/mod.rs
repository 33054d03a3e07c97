pub mod backup;
mod settings;

pub use backup::{
    export_archive, read_restore_candidate, validate_restore_candidate, BackupError,
    RestoreFileError, RestoreKind, ValidationError,
};
pub use settings::{SettingsError, SettingsStore};
