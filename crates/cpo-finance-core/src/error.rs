use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpoFinanceError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context}")]
    Overflow { context: String },

    #[error("Analysis cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CpoFinanceError {
    /// Shorthand for the most common validation failure.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CpoFinanceError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn overflow(context: impl Into<String>) -> Self {
        CpoFinanceError::Overflow {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for CpoFinanceError {
    fn from(e: serde_json::Error) -> Self {
        CpoFinanceError::SerializationError(e.to_string())
    }
}
