//! Error types for the node model

use crate::core::state::ResultValue;
use std::fmt;
use thiserror::Error;

/// A single offending field in a rejected document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dot-separated path of the field, e.g. `data.kernel_revision.url`
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Document failed validation; every offending field is listed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} document: {}", join_errors(.errors))]
pub struct ValidationError {
    /// Kind tag the document was validated against
    pub kind: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(kind: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            kind: kind.into(),
            errors,
        }
    }

    /// Check whether a given field path was reported
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Discriminator names no registered node kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported node kind: {kind}")]
pub struct UnsupportedKindError {
    pub kind: String,
}

/// A designated field could not be converted to its internal representation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce field '{field}' value '{value}' to {expected}")]
pub struct CoercionError {
    pub field: String,
    pub value: String,
    pub expected: &'static str,
}

/// Filter parameters that cannot be translated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("field '{field}' has both a plain value and operator filters")]
    ConflictingFilter { field: String },

    #[error("unknown operator '{operator}' on field '{field}'")]
    UnknownOperator { field: String, operator: String },
}

/// The precondition that failed while building a regression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegressionCheck {
    /// Node kind carries no build/test descriptors to compare
    UnsupportedKind { kind: String },
    /// Both nodes must describe the same job configuration
    FieldMismatch {
        field: &'static str,
        fail_value: String,
        pass_value: String,
    },
    /// The pass node must have been created strictly before the fail node
    TemporalOrder { fail_created: String, pass_created: String },
    PassResult { actual: Option<ResultValue> },
    FailResult { actual: Option<ResultValue> },
}

impl fmt::Display for RegressionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionCheck::UnsupportedKind { kind } => {
                write!(f, "{} nodes cannot be compared for regressions", kind)
            }
            RegressionCheck::FieldMismatch {
                field,
                fail_value,
                pass_value,
            } => write!(
                f,
                "{} is different in the fail node ({}) than in the pass node ({})",
                field, fail_value, pass_value
            ),
            RegressionCheck::TemporalOrder {
                fail_created,
                pass_created,
            } => write!(
                f,
                "The fail node ({}) was not created after the pass node ({})",
                fail_created, pass_created
            ),
            RegressionCheck::PassResult { actual } => {
                write!(f, "The pass node has a wrong result: {}", display_result(*actual))
            }
            RegressionCheck::FailResult { actual } => {
                write!(f, "The fail node has a wrong result: {}", display_result(*actual))
            }
        }
    }
}

fn display_result(result: Option<ResultValue>) -> String {
    result
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Two nodes are not a consistent pass/fail pair
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error creating regression for nodes {pass_node} (last passed) and {fail_node} (first failed). {check}")]
pub struct RegressionConsistencyError {
    pub fail_node: String,
    pub pass_node: String,
    pub check: RegressionCheck,
}

/// Umbrella error for model operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UnsupportedKind(#[from] UnsupportedKindError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    RegressionConsistency(#[from] RegressionConsistencyError),

    #[error("Failed to serialize node: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
