//! Error kinds surfaced by every core operation.
//!
//! Variants carry tagged data, not prose. Callers translate `kind()` into
//! whatever their presentation layer needs.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

/// Which keyed collection a lookup missed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Profile,
    Job,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch job configuration that cannot produce a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    MissingProfileName,
    EmptySourcePath,
    EmptyOutputFolder,
    EmptyFieldList,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::MissingProfileName => "missing_profile_name",
            Self::EmptySourcePath => "empty_source_path",
            Self::EmptyOutputFolder => "empty_output_folder",
            Self::EmptyFieldList => "empty_field_list",
        };
        f.write_str(tag)
    }
}

/// Structurally malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyProfileName,
    EmptyFieldName { index: usize },
    DuplicateField(String),
    EmptyKeyword { field: String, index: usize },
    EmptyColumnName { file: String, index: usize },
    EmptyJobName,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyProfileName => f.write_str("empty_profile_name"),
            Self::EmptyFieldName { index } => write!(f, "empty_field_name[{index}]"),
            Self::DuplicateField(name) => write!(f, "duplicate_field({name})"),
            Self::EmptyKeyword { field, index } => {
                write!(f, "empty_keyword({field}[{index}])")
            }
            Self::EmptyColumnName { file, index } => {
                write!(f, "empty_column_name({file}[{index}])")
            }
            Self::EmptyJobName => f.write_str("empty_job_name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("duplicate_name: {0}")]
    DuplicateName(String),

    #[error("not_found: {resource} {key}")]
    NotFound { resource: Resource, key: String },

    #[error("invalid_config: {0}")]
    InvalidConfig(ConfigIssue),

    #[error("validation: {0}")]
    Validation(ValidationIssue),

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl MappingError {
    pub fn not_found(resource: Resource, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            key: key.into(),
        }
    }

    /// Stable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateName(_) => "duplicate_name",
            Self::NotFound { .. } => "not_found",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// True for the generator's "profile name did not resolve" case.
    pub fn is_profile_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound {
                resource: Resource::Profile,
                ..
            }
        )
    }
}
