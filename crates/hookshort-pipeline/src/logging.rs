//! Structured run logging.
//!
//! Every pipeline run gets a [`StageLogger`] carrying a run id, so events
//! from the stages of one invocation can be correlated.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use crate::error::Stage;

/// Logger for the stages of one pipeline run.
#[derive(Debug, Clone)]
pub struct StageLogger {
    run_id: String,
    operation: String,
}

impl StageLogger {
    /// Create a logger with a fresh run id.
    pub fn new(operation: &str) -> Self {
        Self::from_string(&Uuid::new_v4().to_string(), operation)
    }

    pub fn from_string(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, stage: Stage, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, stage: Stage, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, stage: Stage, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            "Stage failed: {}", message
        );
    }

    pub fn log_completion(&self, stage: Stage, elapsed_secs: f64) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            elapsed_ms = (elapsed_secs * 1000.0) as u64,
            "Stage completed"
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = StageLogger::new("process");
        let b = StageLogger::new("process");
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.operation(), "process");
        assert!(Uuid::parse_str(a.run_id()).is_ok());
    }

    #[test]
    fn test_from_string() {
        let logger = StageLogger::from_string("run-123", "process");
        assert_eq!(logger.run_id(), "run-123");
    }
}
