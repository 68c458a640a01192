use thiserror::Error;

/// Errors raised while dispatching methods or reading typed values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassError {
    #[error("Method '{method}' not found on class {class}")]
    MethodNotFound { class: String, method: String },

    #[error("Method '{method}' on class {class} has no parent implementation")]
    NoParentMethod { class: String, method: String },

    #[error("Method '{method}' on class {class} failed: {message}")]
    Method {
        class: String,
        method: String,
        message: String,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field '{field}' not found on class {class}")]
    FieldNotFound { class: String, field: String },

    #[error("Field '{field}' on class {class} is already being updated")]
    FieldBusy { class: String, field: String },

    #[error("Class not found: {0}")]
    ClassNotFound(String),
}
