//! Per-task progress tracking.
//!
//! An [`AdminTask`] counts completed steps in three categories (preparation,
//! location batches, feature definitions) against a fixed expected total and
//! derives the completion percentage, the lifecycle state and the start/end
//! timestamps from those counters. It is plain data: the task manager owns
//! every instance and is the only thing that mutates one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdminConfig;
use crate::tasks::state::{TaskState, TaskType};

/// Expected number of steps per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedSteps {
    pub preparation: u32,
    pub locations: u32,
    pub feature_definitions: u32,
}

impl ExpectedSteps {
    pub fn new(preparation: u32, locations: u32, feature_definitions: u32) -> Self {
        Self {
            preparation,
            locations,
            feature_definitions,
        }
    }

    /// Steps of a load task under `config`.
    pub fn for_load(config: &AdminConfig) -> Self {
        Self::new(
            config.preparation_steps_for_load,
            config.location_steps_for_load,
            config.feature_definition_steps_for_load,
        )
    }

    pub fn total(&self) -> u64 {
        u64::from(self.preparation) + u64::from(self.locations) + u64::from(self.feature_definitions)
    }
}

impl Default for ExpectedSteps {
    fn default() -> Self {
        Self::for_load(&AdminConfig::default())
    }
}

/// Completed vs. expected steps of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounter {
    pub completed: u32,
    pub expected: u32,
}

impl StepCounter {
    pub fn new(expected: u32) -> Self {
        Self {
            completed: 0,
            expected,
        }
    }

    /// Add `n` completed steps, never counting past the expected total.
    /// Returns whether the category is now done.
    pub fn record(&mut self, n: u32) -> bool {
        self.completed = self.completed.saturating_add(n).min(self.expected);
        self.is_done()
    }

    /// A category with nothing expected is done from the start.
    pub fn is_done(&self) -> bool {
        self.completed >= self.expected
    }
}

/// A task and its progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminTask {
    pub id: Uuid,
    pub title: String,
    pub task_type: TaskType,
    pub created_at: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    state: TaskState,
    preparation: StepCounter,
    locations: StepCounter,
    feature_definitions: StepCounter,
    failed_fetches: u32,
}

impl AdminTask {
    pub fn new(title: impl Into<String>, task_type: TaskType, expected: ExpectedSteps) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            task_type,
            created_at: Utc::now(),
            start: None,
            end: None,
            state: TaskState::Created,
            preparation: StepCounter::new(expected.preparation),
            locations: StepCounter::new(expected.locations),
            feature_definitions: StepCounter::new(expected.feature_definitions),
            failed_fetches: 0,
        }
    }

    /// Move into `PreparationPending` (or further, when no preparation is
    /// expected).
    pub fn begin_preparation(&mut self) {
        self.advance(TaskState::PreparationPending);
        self.refresh();
    }

    /// Record `n` preparation acknowledgments. Returns whether all expected
    /// acknowledgments are in.
    pub fn record_preparation_step(&mut self, n: u32) -> bool {
        let done = self.preparation.record(n);
        self.refresh();
        done
    }

    /// Record `n` processed location batches. Returns whether all expected
    /// batches are in.
    pub fn record_location_step(&mut self, n: u32) -> bool {
        let done = self.locations.record(n);
        self.refresh();
        done
    }

    /// Record `n` feature definition steps. Returns whether all expected
    /// steps are in.
    pub fn record_feature_definition_step(&mut self, n: u32) -> bool {
        let done = self.feature_definitions.record(n);
        self.refresh();
        done
    }

    /// Count a failed fetch. Progress is left untouched.
    pub fn record_fetch_failure(&mut self) {
        self.failed_fetches = self.failed_fetches.saturating_add(1);
    }

    /// Completed steps over expected steps across all categories, in `[0, 1]`.
    pub fn percent_completed(&self) -> f64 {
        let expected = self.expected().total();
        if expected == 0 {
            return 1.0;
        }
        let completed = u64::from(self.preparation.completed)
            + u64::from(self.locations.completed)
            + u64::from(self.feature_definitions.completed);
        (completed as f64 / expected as f64).clamp(0.0, 1.0)
    }

    pub fn expected(&self) -> ExpectedSteps {
        ExpectedSteps::new(
            self.preparation.expected,
            self.locations.expected,
            self.feature_definitions.expected,
        )
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Set the first time progress rose above zero.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Set the first time progress reached 100%.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn preparation(&self) -> StepCounter {
        self.preparation
    }

    pub fn locations(&self) -> StepCounter {
        self.locations
    }

    pub fn feature_definitions(&self) -> StepCounter {
        self.feature_definitions
    }

    pub fn failed_fetches(&self) -> u32 {
        self.failed_fetches
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }

    /// Time between start and end (or now, while running).
    pub fn elapsed(&self) -> Option<Duration> {
        self.start.map(|start| {
            let end = self.end.unwrap_or_else(Utc::now);
            end.signed_duration_since(start)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    fn advance(&mut self, target: TaskState) {
        if self.state.can_transition_to(target) {
            tracing::debug!(
                task_id = %self.id,
                from = %self.state,
                to = %target,
                "Task state transition"
            );
            self.state = target;
        }
    }

    fn refresh(&mut self) {
        let percent = self.percent_completed();
        let now = Utc::now();

        if percent > 0.0 && self.start.is_none() {
            self.start = Some(now);
        }
        if percent >= 1.0 && self.end.is_none() {
            self.end = Some(now);
        }

        let target = if percent >= 1.0 {
            TaskState::Complete
        } else if self.preparation.is_done() && self.locations.is_done() {
            TaskState::FeatureDefinitionsAggregating
        } else if self.preparation.is_done() {
            TaskState::ResourcesLoading
        } else {
            self.state
        };
        self.advance(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_task(preparation: u32, locations: u32, definitions: u32) -> AdminTask {
        AdminTask::new(
            "Load farm",
            TaskType::Load,
            ExpectedSteps::new(preparation, locations, definitions),
        )
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_step_per_category_walks_the_lifecycle() {
        let mut task = load_task(1, 1, 1);
        assert_eq!(task.state(), TaskState::Created);
        assert_eq!(task.percent_completed(), 0.0);

        assert!(task.record_preparation_step(1));
        assert!(approx(task.percent_completed(), 1.0 / 3.0));
        assert_eq!(task.state(), TaskState::ResourcesLoading);

        assert!(task.record_location_step(1));
        assert!(approx(task.percent_completed(), 2.0 / 3.0));
        assert_eq!(task.state(), TaskState::FeatureDefinitionsAggregating);

        assert!(task.record_feature_definition_step(1));
        assert_eq!(task.percent_completed(), 1.0);
        assert_eq!(task.state(), TaskState::Complete);
        assert!(task.is_complete());
    }

    #[test]
    fn percent_is_monotonic_and_bounded() {
        let mut task = load_task(2, 3, 1);
        let mut last = task.percent_completed();
        let steps: [fn(&mut AdminTask) -> bool; 8] = [
            |t| t.record_preparation_step(1),
            |t| t.record_location_step(1),
            |t| t.record_preparation_step(5),
            |t| t.record_location_step(1),
            |t| t.record_feature_definition_step(40),
            |t| t.record_location_step(0),
            |t| t.record_location_step(1),
            |t| t.record_location_step(1),
        ];
        for step in steps {
            step(&mut task);
            let now = task.percent_completed();
            assert!(now >= last, "{now} < {last}");
            assert!((0.0..=1.0).contains(&now));
            last = now;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn counters_never_exceed_expected() {
        let mut task = load_task(2, 1, 1);
        task.record_preparation_step(7);
        task.record_feature_definition_step(u32::MAX);
        task.record_feature_definition_step(u32::MAX);
        assert_eq!(task.preparation().completed, 2);
        assert_eq!(task.feature_definitions().completed, 1);
    }

    #[test]
    fn preparation_reports_done_only_at_expected_count() {
        let mut task = load_task(2, 1, 1);
        assert!(!task.record_preparation_step(1));
        assert!(task.record_preparation_step(1));
    }

    #[test]
    fn start_and_end_are_set_once() {
        let mut task = load_task(1, 1, 1);
        assert!(task.start().is_none());

        task.record_preparation_step(1);
        let start = task.start().expect("started after first step");
        assert!(task.end().is_none());

        task.record_location_step(1);
        assert_eq!(task.start(), Some(start));

        task.record_feature_definition_step(1);
        let end = task.end().expect("ended at 100%");

        // Recording already-counted steps changes nothing.
        task.record_preparation_step(1);
        task.record_location_step(3);
        task.record_feature_definition_step(1);
        assert_eq!(task.start(), Some(start));
        assert_eq!(task.end(), Some(end));
        assert_eq!(task.state(), TaskState::Complete);
    }

    #[test]
    fn zero_expected_category_is_vacuously_done() {
        let mut task = load_task(0, 1, 0);
        assert!(task.preparation().is_done());
        assert_eq!(task.percent_completed(), 0.0);

        task.begin_preparation();
        assert_eq!(task.state(), TaskState::ResourcesLoading);

        assert!(task.record_location_step(1));
        assert_eq!(task.percent_completed(), 1.0);
        assert_eq!(task.state(), TaskState::Complete);
    }

    #[test]
    fn nothing_expected_is_complete() {
        let mut task = load_task(0, 0, 0);
        assert_eq!(task.percent_completed(), 1.0);
        task.begin_preparation();
        assert!(task.is_complete());
        assert!(task.start().is_some());
        assert!(task.end().is_some());
    }

    #[test]
    fn begin_preparation_waits_for_acknowledgments() {
        let mut task = load_task(2, 1, 1);
        task.begin_preparation();
        assert_eq!(task.state(), TaskState::PreparationPending);
        assert!(task.start().is_none());
    }

    #[test]
    fn state_never_moves_backward() {
        let mut task = load_task(1, 1, 1);
        task.record_preparation_step(1);
        task.record_location_step(1);
        assert_eq!(task.state(), TaskState::FeatureDefinitionsAggregating);

        task.begin_preparation();
        assert_eq!(task.state(), TaskState::FeatureDefinitionsAggregating);
    }

    #[test]
    fn fetch_failures_do_not_advance() {
        let mut task = load_task(1, 1, 1);
        task.record_preparation_step(1);
        let before = task.percent_completed();
        task.record_fetch_failure();
        assert_eq!(task.failed_fetches(), 1);
        assert_eq!(task.percent_completed(), before);
        assert!(task.percent_completed() < 1.0);
    }

    #[test]
    fn elapsed_requires_start() {
        let mut task = load_task(1, 1, 1);
        assert!(task.elapsed().is_none());
        task.record_preparation_step(1);
        assert!(task.elapsed().is_some());
    }
}
