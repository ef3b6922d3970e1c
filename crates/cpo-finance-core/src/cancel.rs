use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CpoFinanceError;
use crate::CpoFinanceResult;

/// Cooperative cancellation flag shared between a caller and a running
/// analysis. Long loops call [`CancellationToken::check`] at each year or
/// scenario boundary; a stage that observes cancellation returns an error
/// instead of a partial series.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        tracing::info!("analysis cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &str) -> CpoFinanceResult<()> {
        if self.is_cancelled() {
            return Err(CpoFinanceError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Check an optional token; `None` never cancels.
pub(crate) fn checkpoint(token: Option<&CancellationToken>, stage: &str) -> CpoFinanceResult<()> {
    match token {
        Some(t) => t.check(stage),
        None => Ok(()),
    }
}
