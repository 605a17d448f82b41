use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub mod codes {
    pub const PARSE: &str = "RD101";
    pub const DUPLICATE_KEY: &str = "RD102";
    pub const KEY_EXISTS: &str = "RD103";
    pub const KEY_NOT_FOUND: &str = "RD104";
    pub const INVALID_FIELD: &str = "RD105";
    pub const MISSING_FILE: &str = "RD201";
    pub const FILE_MISMATCH: &str = "RD202";
    pub const IO: &str = "RD203";
    pub const REMOTE_CONFLICT: &str = "RD301";
    pub const REMOTE: &str = "RD302";
    pub const CONCURRENT_MODIFICATION: &str = "RD401";
    pub const UPLOAD_INCONSISTENT: &str = "RD901";
}

/// Which attribute of a file disagreed with its expected value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchField {
    Size,
    Md5sum,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => f.write_str("size"),
            Self::Md5sum => f.write_str("md5sum"),
        }
    }
}

/// Errors surfaced by the manifest ledger.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("[RD101] {}:{line}: {reason}", .manifest.display())]
    Parse {
        manifest: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("[RD102] '{name}' is duplicated in '{}' (line {line})", .manifest.display())]
    DuplicateKey {
        name: String,
        manifest: PathBuf,
        line: usize,
    },
    #[error("[RD103] '{name}' already exists in '{}'", .manifest.display())]
    KeyAlreadyExists { name: String, manifest: PathBuf },
    #[error("[RD104] '{name}' is not in '{}'", .manifest.display())]
    KeyNotFound { name: String, manifest: PathBuf },
    #[error("[RD105] invalid {field} '{value}': {reason}")]
    InvalidField {
        field: String,
        value: String,
        reason: String,
    },
    #[error("[RD201] can not find '{name}' at '{}'", .path.display())]
    MissingFile { name: String, path: PathBuf },
    #[error(
        "[RD202] '{}' has {field} '{actual}' vs '{expected}' in the manifest (record '{name}')", .path.display()
    )]
    FileMismatch {
        name: String,
        path: PathBuf,
        field: MismatchField,
        expected: String,
        actual: String,
    },
    #[error("[RD203] i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("[RD301] '{location}' already exists with {field} '{remote}' vs '{local}' for the local file")]
    FileAlreadyExists {
        location: String,
        field: MismatchField,
        remote: String,
        local: String,
    },
    #[error("[RD302] remote store request for '{location}' failed: {source}")]
    Remote {
        location: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error(
        "[RD401] '{}' was modified by another program (on-disk md5sum '{on_disk}' vs '{observed}')", .manifest.display()
    )]
    ConcurrentModification {
        manifest: PathBuf,
        observed: String,
        on_disk: String,
    },
    #[error("[RD901] '{location}' does not match the file just uploaded: {detail}")]
    UploadInconsistent { location: String, detail: String },
}

impl ManifestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => codes::PARSE,
            Self::DuplicateKey { .. } => codes::DUPLICATE_KEY,
            Self::KeyAlreadyExists { .. } => codes::KEY_EXISTS,
            Self::KeyNotFound { .. } => codes::KEY_NOT_FOUND,
            Self::InvalidField { .. } => codes::INVALID_FIELD,
            Self::MissingFile { .. } => codes::MISSING_FILE,
            Self::FileMismatch { .. } => codes::FILE_MISMATCH,
            Self::Io { .. } => codes::IO,
            Self::FileAlreadyExists { .. } => codes::REMOTE_CONFLICT,
            Self::Remote { .. } => codes::REMOTE,
            Self::ConcurrentModification { .. } => codes::CONCURRENT_MODIFICATION,
            Self::UploadInconsistent { .. } => codes::UPLOAD_INCONSISTENT,
        }
    }

    /// Short machine-readable reason used in command output.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "invalid_manifest",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::KeyAlreadyExists { .. } => "key_exists",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::InvalidField { .. } => "invalid_field",
            Self::MissingFile { .. } => "missing_file",
            Self::FileMismatch { .. } => "file_mismatch",
            Self::Io { .. } => "io_error",
            Self::FileAlreadyExists { .. } => "remote_conflict",
            Self::Remote { .. } => "remote_error",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::UploadInconsistent { .. } => "upload_inconsistent",
        }
    }

    /// Whether the caller can fix the problem by changing inputs or files.
    ///
    /// Remote transport failures, local i/o failures and store bookkeeping
    /// inconsistencies are environment or internal failures instead.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::Io { .. } | Self::Remote { .. } | Self::UploadInconsistent { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_diagnostic_codes() {
        let err = ManifestError::KeyNotFound {
            name: "eight_as".into(),
            manifest: PathBuf::from("data-manifest.tsv"),
        };
        assert_eq!(
            err.to_string(),
            "[RD104] 'eight_as' is not in 'data-manifest.tsv'"
        );
        assert_eq!(err.code(), codes::KEY_NOT_FOUND);
        assert!(err.is_user_error());
    }

    #[test]
    fn internal_failures_are_not_user_errors() {
        let err = ManifestError::UploadInconsistent {
            location: "gs://bucket/a".into(),
            detail: "size 3 vs 4".into(),
        };
        assert!(!err.is_user_error());
        assert_eq!(err.reason(), "upload_inconsistent");
    }

    #[test]
    fn mismatch_field_serializes_lowercase() {
        let value = serde_json::to_value(MismatchField::Md5sum).unwrap();
        assert_eq!(value, serde_json::json!("md5sum"));
    }
}
