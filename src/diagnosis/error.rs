//! Error types for extraction and normalization

use std::fmt;
use thiserror::Error;

/// The raw text held no balanced JSON object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("could not find JSON in response")]
    NotFound,
}

/// One structural violation found by the normalizer.
///
/// `Display` renders the human-readable message shown to users; the variant
/// and its path stay available for callers that need to match on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Response must be a JSON object.")]
    NotAnObject,

    #[error("Missing required field '{field}'.")]
    Missing { field: String },

    #[error("'{field}' must be a non-empty string.")]
    EmptyString { field: String },

    #[error("'{field}' must be a string.")]
    NotAString { field: String },

    #[error("'{field}' must be an array.")]
    NotAnArray { field: String },

    #[error("'{field}' must contain only strings.")]
    NonStringItem { field: String },

    #[error("'confidence' must be one of: low, medium, high.")]
    InvalidConfidence,

    #[error("'status' must be one of: pending, resolved.")]
    InvalidStatus,

    #[error("{path} must be an object.")]
    ElementNotObject { path: String },

    #[error("{path} must be a string.")]
    ElementNotString { path: String },

    #[error("{path} must be an integer.")]
    ElementNotInteger { path: String },
}

impl FieldError {
    /// Field or element path the error refers to, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            FieldError::NotAnObject => None,
            FieldError::InvalidConfidence => Some("confidence"),
            FieldError::InvalidStatus => Some("status"),
            FieldError::Missing { field }
            | FieldError::EmptyString { field }
            | FieldError::NotAString { field }
            | FieldError::NotAnArray { field }
            | FieldError::NonStringItem { field } => Some(field),
            FieldError::ElementNotObject { path }
            | FieldError::ElementNotString { path }
            | FieldError::ElementNotInteger { path } => Some(path),
        }
    }
}

/// Every violation found in one normalization pass, in field order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Rendered messages, one per violation.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

/// Why one attempt at turning model text into a diagnosis failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosisFailure {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("response JSON is invalid: {0}")]
    Decode(String),

    #[error("response failed validation: {0}")]
    Validation(#[from] ValidationErrors),
}

impl From<serde_json::Error> for DiagnosisFailure {
    fn from(err: serde_json::Error) -> Self {
        DiagnosisFailure::Decode(err.to_string())
    }
}
