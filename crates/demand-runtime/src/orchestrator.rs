//! Sequential pipeline orchestrator.
//!
//! [`PipelineOrchestrator`] runs ingest → clean → aggregate → train in order,
//! tracking a [`StageState`] per stage and stopping at the first failure.
//! Stages communicate only through the files named in [`PipelineConfig`].

use std::fmt;

use demand_core::settings::PipelineConfig;
use demand_core::{DemandError, Result};
use demand_data::aggregator::AggregateSummary;
use demand_data::cleaner::CleanSummary;
use demand_data::ingest::IngestSummary;
use tracing::{error, info};

use crate::stages::{run_aggregation, run_cleaning, run_ingestion, run_training, TrainSummary};

// ── Stage ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Clean,
    Aggregate,
    Train,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 4] = [Stage::Ingest, Stage::Clean, Stage::Aggregate, Stage::Train];

    fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Clean => "clean",
            Stage::Aggregate => "aggregate",
            Stage::Train => "train",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── StageState ────────────────────────────────────────────────────────────────

/// Lifecycle of one stage within a run: `Idle → Running → Completed` or
/// `Idle → Running → FailedFatal`. There is no retry edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    Idle,
    Running,
    Completed,
    FailedFatal(String),
}

impl StageState {
    /// `true` when `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &StageState) -> bool {
        matches!(
            (self, next),
            (StageState::Idle, StageState::Running)
                | (StageState::Running, StageState::Completed)
                | (StageState::Running, StageState::FailedFatal(_))
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Idle => f.write_str("idle"),
            StageState::Running => f.write_str("running"),
            StageState::Completed => f.write_str("completed"),
            StageState::FailedFatal(reason) => write!(f, "failed: {reason}"),
        }
    }
}

// ── PipelineReport ────────────────────────────────────────────────────────────

/// Summaries of the stages that completed.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub ingest: Option<IngestSummary>,
    pub clean: Option<CleanSummary>,
    pub aggregate: Option<AggregateSummary>,
    pub train: Option<TrainSummary>,
}

// ── PipelineOrchestrator ──────────────────────────────────────────────────────

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    states: [(Stage, StageState); 4],
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            states: Stage::ALL.map(|s| (s, StageState::Idle)),
        }
    }

    pub fn state(&self, stage: Stage) -> &StageState {
        &self.states[stage.position()].1
    }

    pub fn states(&self) -> &[(Stage, StageState)] {
        &self.states
    }

    /// Run every stage once, in order. The first failure marks its stage
    /// `FailedFatal`, leaves later stages `Idle` and is returned.
    pub fn run(&mut self) -> Result<PipelineReport> {
        if self.states.iter().any(|(_, s)| *s != StageState::Idle) {
            return Err(DemandError::Config(
                "pipeline has already run; create a new orchestrator".to_string(),
            ));
        }

        let mut report = PipelineReport::default();
        let outcome = self.run_stages(&mut report);

        for (stage, state) in &self.states {
            info!(stage = stage.name(), state = %state, "stage final state");
        }
        outcome.map(|()| report)
    }

    fn run_stages(&mut self, report: &mut PipelineReport) -> Result<()> {
        let cfg = self.config.clone();

        report.ingest = Some(self.execute(Stage::Ingest, || run_ingestion(&cfg.ingest()))?);
        report.clean = Some(self.execute(Stage::Clean, || run_cleaning(&cfg.clean()))?);
        report.aggregate = Some(self.execute(Stage::Aggregate, || run_aggregation(&cfg.aggregate()))?);
        report.train = Some(self.execute(Stage::Train, || run_training(&cfg.train()))?);
        Ok(())
    }

    fn execute<T>(&mut self, stage: Stage, work: impl FnOnce() -> Result<T>) -> Result<T> {
        self.transition(stage, StageState::Running);
        info!(stage = stage.name(), "stage started");

        match work() {
            Ok(summary) => {
                self.transition(stage, StageState::Completed);
                info!(stage = stage.name(), "stage completed");
                Ok(summary)
            }
            Err(e) => {
                error!(stage = stage.name(), error = %e, "stage failed");
                self.transition(stage, StageState::FailedFatal(e.to_string()));
                Err(e)
            }
        }
    }

    fn transition(&mut self, stage: Stage, next: StageState) {
        let state = &mut self.states[stage.position()].1;
        debug_assert!(
            state.can_transition_to(&next),
            "illegal transition {state} → {next} for {stage}"
        );
        *state = next;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            source: root.join("trips.csv"),
            db: root.join("trips.db"),
            table: "trips".to_string(),
            chunk_size: 1000,
            cleaned: root.join("cleaned.csv"),
            hourly: root.join("hourly.csv"),
            model: root.join("model.json"),
        }
    }

    // ── StageState ────────────────────────────────────────────────────────────

    #[test]
    fn test_legal_transitions() {
        use StageState::*;
        assert!(Idle.can_transition_to(&Running));
        assert!(Running.can_transition_to(&Completed));
        assert!(Running.can_transition_to(&FailedFatal("x".to_string())));

        assert!(!Idle.can_transition_to(&Completed));
        assert!(!Completed.can_transition_to(&Running));
        assert!(!FailedFatal("x".to_string()).can_transition_to(&Running));
    }

    // ── PipelineOrchestrator ──────────────────────────────────────────────────

    #[test]
    fn test_new_orchestrator_is_idle() {
        let dir = TempDir::new().unwrap();
        let orch = PipelineOrchestrator::new(config(dir.path()));
        assert!(orch.states().iter().all(|(_, s)| *s == StageState::Idle));
        let order: Vec<Stage> = orch.states().iter().map(|(s, _)| *s).collect();
        assert_eq!(order, Stage::ALL.to_vec());
    }

    #[test]
    fn test_failure_stops_pipeline() {
        let dir = TempDir::new().unwrap();
        let mut orch = PipelineOrchestrator::new(config(dir.path()));

        let err = orch.run().unwrap_err();
        assert!(matches!(err, DemandError::SourceNotFound(_)));
        assert!(matches!(orch.state(Stage::Ingest), StageState::FailedFatal(_)));
        assert_eq!(orch.state(Stage::Clean), &StageState::Idle);
        assert_eq!(orch.state(Stage::Train), &StageState::Idle);
    }

    #[test]
    fn test_second_run_rejected() {
        let dir = TempDir::new().unwrap();
        let mut orch = PipelineOrchestrator::new(config(dir.path()));
        let _ = orch.run();
        assert!(matches!(orch.run(), Err(DemandError::Config(_))));
    }
}
