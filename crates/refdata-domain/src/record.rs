use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;

use crate::error::ManifestError;

/// Columns a manifest may carry. The header line orders them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestField {
    Name,
    LocalPath,
    RemotePath,
    Md5sum,
    Size,
    Notes,
}

impl ManifestField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LocalPath => "local_path",
            Self::RemotePath => "remote_path",
            Self::Md5sum => "md5sum",
            Self::Size => "size",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for ManifestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ManifestField {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "name" => Ok(Self::Name),
            "local_path" => Ok(Self::LocalPath),
            "remote_path" => Ok(Self::RemotePath),
            "md5sum" => Ok(Self::Md5sum),
            "size" => Ok(Self::Size),
            "notes" => Ok(Self::Notes),
            other => Err(format!("unknown manifest column '{other}'")),
        }
    }
}

/// Column order used when a new manifest is created.
pub const DEFAULT_HEADER: [ManifestField; 6] = [
    ManifestField::Name,
    ManifestField::LocalPath,
    ManifestField::RemotePath,
    ManifestField::Md5sum,
    ManifestField::Size,
    ManifestField::Notes,
];

/// One tracked file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    pub name: String,
    pub local_path: String,
    pub remote_path: String,
    pub md5sum: String,
    pub size: u64,
    pub notes: String,
}

impl ManifestRecord {
    #[must_use]
    pub fn value(&self, field: ManifestField) -> Cow<'_, str> {
        match field {
            ManifestField::Name => Cow::Borrowed(&self.name),
            ManifestField::LocalPath => Cow::Borrowed(&self.local_path),
            ManifestField::RemotePath => Cow::Borrowed(&self.remote_path),
            ManifestField::Md5sum => Cow::Borrowed(&self.md5sum),
            ManifestField::Size => Cow::Owned(self.size.to_string()),
            ManifestField::Notes => Cow::Borrowed(&self.notes),
        }
    }

    /// Builds a record from one split line; `values` follow `header` order.
    pub(crate) fn from_columns(header: &[ManifestField], values: &[&str]) -> Result<Self, String> {
        let mut record = Self {
            name: String::new(),
            local_path: String::new(),
            remote_path: String::new(),
            md5sum: String::new(),
            size: 0,
            notes: String::new(),
        };
        for (field, value) in header.iter().zip(values) {
            match field {
                ManifestField::Name => record.name = (*value).to_string(),
                ManifestField::LocalPath => record.local_path = (*value).to_string(),
                ManifestField::RemotePath => record.remote_path = (*value).to_string(),
                ManifestField::Md5sum => record.md5sum = (*value).to_string(),
                ManifestField::Size => {
                    record.size = value
                        .parse()
                        .map_err(|_| format!("size '{value}' is not a byte count"))?;
                }
                ManifestField::Notes => record.notes = (*value).to_string(),
            }
        }
        if record.name.is_empty() {
            return Err("record has an empty name".to_string());
        }
        Ok(record)
    }

    /// Rejects values the tab-delimited format cannot represent.
    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_field(ManifestField::Name, &self.name)?;
        validate_field(ManifestField::LocalPath, &self.local_path)?;
        validate_field(ManifestField::RemotePath, &self.remote_path)?;
        validate_field(ManifestField::Md5sum, &self.md5sum)?;
        validate_field(ManifestField::Notes, &self.notes)
    }
}

pub fn validate_field(field: ManifestField, value: &str) -> Result<(), ManifestError> {
    let invalid = |reason: &str| ManifestError::InvalidField {
        field: field.as_str().to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.contains(['\t', '\n', '\r']) {
        return Err(invalid("values may not contain tabs or line breaks"));
    }
    if value.is_empty() && field != ManifestField::Notes {
        return Err(invalid("value may not be empty"));
    }
    Ok(())
}

/// Rejects paths that would resolve outside the directory they are joined
/// to: absolute paths, drive prefixes and `..` components.
pub fn validate_relative_path(field: ManifestField, value: &str) -> Result<(), ManifestError> {
    validate_field(field, value)?;
    let escapes = Path::new(value)
        .components()
        .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ManifestError::InvalidField {
            field: field.as_str().to_string(),
            value: value.to_string(),
            reason: "path must stay below its prefix (no '..' or absolute paths)".to_string(),
        });
    }
    Ok(())
}
