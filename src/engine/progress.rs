use super::report::{Stage, StepRecord, StepResult};
use crate::ui;
use colored::Colorize;

/// Progress callback for a provisioning run
///
/// Implement this trait to receive updates while the workflow runs.
pub trait Progress: Send {
    /// Called when a stage starts
    fn on_stage_start(&mut self, stage: Stage);

    /// Called after every recorded step
    fn on_step(&mut self, step: &StepRecord);

    /// Called when a stage completes
    fn on_stage_complete(&mut self, stage: Stage);
}

/// Terminal output with stage counters.
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Progress for ConsoleProgress {
    fn on_stage_start(&mut self, stage: Stage) {
        if self.quiet {
            return;
        }
        let num = Stage::ALL.iter().position(|s| *s == stage).map_or(0, |i| i + 1);
        println!();
        ui::step(num, Stage::ALL.len(), stage.title());
    }

    fn on_step(&mut self, step: &StepRecord) {
        match &step.result {
            StepResult::Failed { reason } => ui::error(&format!("{}: {reason}", step.target)),
            _ if self.quiet => {}
            StepResult::Created => ui::success(&format!("{} {}", step.target, "created".green())),
            StepResult::Adopted => ui::success(&format!("{} {}", step.target, "adopted".cyan())),
            StepResult::Applied => ui::success(&step.target),
            StepResult::AlreadyPresent => ui::dim(&format!("{} (already present)", step.target)),
            StepResult::Skipped { reason } => ui::warn(&format!("{}: skipped, {reason}", step.target)),
        }
    }

    fn on_stage_complete(&mut self, _stage: Stage) {}
}

/// Keeps every event, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingProgress {
    pub stages: Vec<Stage>,
    pub steps: Vec<StepRecord>,
    pub completed: Vec<Stage>,
}

#[cfg(test)]
impl Progress for RecordingProgress {
    fn on_stage_start(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    fn on_step(&mut self, step: &StepRecord) {
        self.steps.push(step.clone());
    }

    fn on_stage_complete(&mut self, stage: Stage) {
        self.completed.push(stage);
    }
}
