//! Outcome Reporter: one structured record per stage of each cycle.

use chrono::{DateTime, Utc};
use mockall::automock;
use tracing::{error, info};

/// Stages of a cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Acl,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Acl => "acl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Succeeded { detail: String },
    Failed { error: String },
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Succeeded { .. })
    }
}

/// Result of one cycle. Built and reported within the cycle, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub bucket: String,
    pub object: String,
    pub upload: StageResult,
    pub acl: StageResult,
}

impl CycleOutcome {
    pub fn stages(&self) -> [(Stage, &StageResult); 2] {
        [(Stage::Upload, &self.upload), (Stage::Acl, &self.acl)]
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait OutcomeReporter: Send + Sync {
    fn report(&self, outcome: &CycleOutcome);
}

/// Default sink: emits each stage as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl OutcomeReporter for TracingReporter {
    fn report(&self, outcome: &CycleOutcome) {
        for (stage, result) in outcome.stages() {
            match result {
                StageResult::Succeeded { detail } => info!(
                    cycle = outcome.cycle,
                    started_at = %outcome.started_at,
                    bucket = %outcome.bucket,
                    object = %outcome.object,
                    stage = stage.as_str(),
                    detail = %detail,
                    "[BACKUP] Stage succeeded"
                ),
                StageResult::Failed { error } => error!(
                    cycle = outcome.cycle,
                    started_at = %outcome.started_at,
                    bucket = %outcome.bucket,
                    object = %outcome.object,
                    stage = stage.as_str(),
                    error = %error,
                    "[BACKUP] Stage failed"
                ),
            }
        }
    }
}
