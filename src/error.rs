//! Error types for mibcs-enrich

use thiserror::Error;

/// Errors that can occur while reading, enriching or writing records
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record is not a JSON object (found {0})")]
    NotAnObject(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("Invalid subject profile: {0}")]
    InvalidProfile(String),

    /// A formula branch reads an intermediate that is never assigned on that path
    #[error("Undefined intermediate `{name}` in {formula}")]
    UndefinedIntermediate {
        formula: &'static str,
        name: &'static str,
    },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<EnrichError>,
    },
}

impl EnrichError {
    /// Attach a 1-based input line number
    pub fn at_line(self, line: usize) -> Self {
        match self {
            EnrichError::Line { .. } => self,
            other => EnrichError::Line {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with any line wrapper removed
    pub fn root(&self) -> &EnrichError {
        match self {
            EnrichError::Line { source, .. } => source.root(),
            other => other,
        }
    }
}
