//! Workflow progress tracking
//!
//! A `WorkflowRun` records the stage machine, per-step timings, and
//! structured errors for one search execution. It is a plain value;
//! the orchestrator owns it and callers get it back in the run result.

use crate::models::SourceName;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Stages a run moves through, in order. `Failed` is reachable from
/// any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Idle,
    Dispatching,
    Aggregating,
    Ranking,
    Analyzing,
    Done,
    Failed,
}

impl WorkflowStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Done | WorkflowStage::Failed)
    }

    /// Completed fraction of the pipeline, in [0, 1]
    pub fn completion(&self) -> f32 {
        match self {
            WorkflowStage::Idle => 0.0,
            WorkflowStage::Dispatching => 0.2,
            WorkflowStage::Aggregating => 0.5,
            WorkflowStage::Ranking => 0.7,
            WorkflowStage::Analyzing => 0.9,
            WorkflowStage::Done | WorkflowStage::Failed => 1.0,
        }
    }
}

/// Timing and outcome of one pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Records produced by this step, where that is meaningful
    pub result_count: Option<usize>,
}

impl StepRecord {
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// A structured error captured during a run. Source errors carry the
/// source they came from; pipeline errors do not.
#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub step: String,
    pub source: Option<SourceName>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub query: String,
    pub stage: WorkflowStage,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub errors: Vec<StepError>,
}

impl WorkflowRun {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            stage: WorkflowStage::Idle,
            started_at: Utc::now(),
            steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn advance(&mut self, stage: WorkflowStage) {
        tracing::debug!(run_id = %self.id, stage = ?stage, "workflow stage");
        self.stage = stage;
    }

    /// Open a step record; pair with `complete_step`
    pub fn start_step(&mut self, name: impl Into<String>) {
        self.steps.push(StepRecord {
            name: name.into(),
            started_at: Utc::now(),
            finished_at: None,
            result_count: None,
        });
    }

    /// Close the most recent open step
    pub fn complete_step(&mut self, result_count: Option<usize>) {
        if let Some(step) = self.steps.iter_mut().rev().find(|s| s.finished_at.is_none()) {
            step.finished_at = Some(Utc::now());
            step.result_count = result_count;
        }
    }

    pub fn record_error(
        &mut self,
        step: impl Into<String>,
        source: Option<SourceName>,
        message: impl Into<String>,
    ) {
        self.errors.push(StepError {
            step: step.into(),
            source,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn completion(&self) -> f32 {
        self.stage.completion()
    }
}
