use thiserror::Error;

#[derive(Error, Debug)]
pub enum KiodbError {
    #[error("Invalid table path: {0}")]
    InvalidPath(String),

    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{column}' expects {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Value {value} already exists in unique column '{column}'")]
    UniqueConstraintViolation { column: String, value: String },

    #[error("Cannot order {left} against {right} in column '{column}'")]
    IncomparableOperands {
        column: String,
        left: String,
        right: String,
    },

    #[error("Condition references unknown column: {0}")]
    UnknownConditionColumn(String),

    #[error("Column '{0}' is not flagged unique")]
    NotUniqueColumn(String),

    #[error("Invalid operator '{0}': must be ==, !=, >, <, >= or <=")]
    InvalidOperator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KiodbError>;
