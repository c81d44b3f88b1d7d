use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::columns::Column;
use crate::wizard::Step;

/// Per-field validation messages produced by a collector.
///
/// Keys are the field names as shown by the front end (`company_name`,
/// `email`, ...). An empty set means the submission was valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} field(s) need attention", .0.len())]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        // first message wins so "required" is not replaced by a format error
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("unsupported logo format `{0}` (expected .jpg, .jpeg, .png or .webp)")]
    UnsupportedFormat(String),

    #[error("could not read logo {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("logo file {0} is empty")]
    Empty(PathBuf),

    #[error("inline image payload is not valid base64")]
    Malformed(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("row {index} does not exist (table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("column `{0}` is not enabled for this invoice")]
    ColumnDisabled(Column),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("price per item must be a non-negative number, got {0}")]
    InvalidPrice(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("'{0}' is not installed or not on PATH (install it with `brew install typst` or `cargo install typst-cli`)")]
    TypstMissing(String),

    #[error("typst compilation failed: {0}")]
    Compile(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Logo(#[from] LogoError),
}

impl PublishError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| PublishError::Io { context, source }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("the invoice can only be generated from the last step (currently on {0})")]
    NotOnLastStep(Step),

    #[error("{slice} data cannot be submitted on the {step} step")]
    WrongStep { step: Step, slice: Step },

    #[error(transparent)]
    Publish(#[from] PublishError),
}
