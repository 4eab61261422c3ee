use thiserror::Error;

use crate::types::TypeDescriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Type `{actual}` does not support this operation: {reason}")]
    TypeMismatch {
        actual: TypeDescriptor,
        reason: &'static str,
    },
    #[error("Size mismatch for `{type}`: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        r#type: TypeDescriptor,
        expected: u64,
        actual: u64,
    },
    #[error("Field index {index} is out of range for a struct with {field_count} fields")]
    IndexOutOfRange { index: usize, field_count: usize },
    #[error("Cannot {operation} operands of type `{left}` and `{right}`")]
    UnsupportedOperand {
        operation: &'static str,
        left: TypeDescriptor,
        right: TypeDescriptor,
    },
    #[error("Division by zero in byte {byte} of the divisor")]
    DivisionByZero { byte: u64 },
    #[error("Malformed encoding at byte {position}: {reason}")]
    MalformedEncoding { position: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
