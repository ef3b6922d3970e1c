pub mod cancel;
pub mod config;
pub mod error;
pub mod time_value;
pub mod types;

pub mod analysis;
pub mod cost;
pub mod financing;
pub mod metrics;
pub mod projection;
pub mod revenue;
pub mod simulation;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::CpoFinanceError;
pub use types::*;

/// Standard result type for all cpo-finance operations
pub type CpoFinanceResult<T> = Result<T, CpoFinanceError>;
