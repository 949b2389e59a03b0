//! Serialized, reactive correction evaluation.
//!
//! [`CorrectionCoordinator`] runs one evaluation against the live stores,
//! holding a per-goal lock so two evaluations of the same goal can never
//! both pass the duplicate check. Right before appending it re-reads the
//! active goal and drops the result if the goal was replaced or cleared in
//! the meantime.
//!
//! [`CorrectionWorker`] drives the coordinator from change notifications
//! instead of polling: every burst of [`StoreChange`]s triggers one run.

use crate::config::Config;
use crate::correction::{already_recorded, CorrectionGenerator, Decision};
use crate::maintenance::MaintenanceEstimator;
use crate::store::{GoalStore, SegmentStore, WeightLogStore};
use crate::{CorrectionSegment, Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use uuid::Uuid;

/// Result of one coordinated evaluation
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    NoActiveGoal,
    Held,
    Appended(CorrectionSegment),
    /// The goal changed while evaluating; the candidate was dropped
    Discarded { goal_id: Uuid },
}

/// Runs correction evaluations against live stores, one at a time per goal
pub struct CorrectionCoordinator {
    log: Arc<dyn WeightLogStore>,
    goals: Arc<dyn GoalStore>,
    segments: Arc<dyn SegmentStore>,
    estimator: MaintenanceEstimator,
    generator: CorrectionGenerator,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CorrectionCoordinator {
    pub fn new(
        log: Arc<dyn WeightLogStore>,
        goals: Arc<dyn GoalStore>,
        segments: Arc<dyn SegmentStore>,
        config: &Config,
    ) -> Self {
        Self {
            log,
            goals,
            segments,
            estimator: MaintenanceEstimator::new(config.estimator.clone()),
            generator: CorrectionGenerator::new(
                config.correction.clone(),
                config.projection.clone(),
            ),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock for `goal_id`. Locks of other goals nobody holds are dropped.
    fn goal_lock(&self, goal_id: Uuid) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Other("goal lock table poisoned".into()))?;
        locks.retain(|id, lock| *id == goal_id || Arc::strong_count(lock) > 1);
        Ok(locks.entry(goal_id).or_default().clone())
    }

    /// Evaluate the active goal once, appending a segment if one is due.
    ///
    /// The maintenance estimate comes from the log; when the log cannot
    /// support one, the goal's baseline maintenance is used instead.
    pub fn run_once(&self, today: NaiveDate) -> Result<Evaluation> {
        let Some(goal) = self.goals.active()? else {
            tracing::debug!("No active goal, nothing to evaluate");
            return Ok(Evaluation::NoActiveGoal);
        };

        let lock = self.goal_lock(goal.id)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::Other(format!("evaluation lock for {} poisoned", goal.id)))?;

        let entries = self.log.query(None)?;
        let estimate = self.estimator.estimate(&entries, today);
        let maintenance = estimate.estimate.or(goal.baseline_maintenance);
        if estimate.estimate.is_none() {
            tracing::debug!(
                "Maintenance unavailable ({}), using goal baseline {:?}",
                estimate.message.as_deref().unwrap_or("unknown"),
                goal.baseline_maintenance
            );
        }

        let existing = self.segments.list_for_goal(goal.id)?;
        let segment = match self.generator.evaluate(&goal, &entries, maintenance, &existing) {
            Decision::Emit(segment) if !already_recorded(&existing, &segment) => segment,
            Decision::Emit(_) => return Ok(Evaluation::Held),
            Decision::Hold(reason) => {
                tracing::debug!("Holding goal {}: {:?}", goal.id, reason);
                return Ok(Evaluation::Held);
            }
        };

        if self.goals.active()?.as_ref() != Some(&goal) {
            tracing::info!(
                "Goal {} changed during evaluation, discarding correction",
                goal.id
            );
            return Ok(Evaluation::Discarded { goal_id: goal.id });
        }

        // Another process may have recorded the same window first
        if self.segments.append(segment.clone())? != segment.id {
            return Ok(Evaluation::Held);
        }
        Ok(Evaluation::Appended(segment))
    }
}

/// A change in one of the engine's input sources
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreChange {
    Log,
    Goal,
    Maintenance,
}

/// What a worker did over its lifetime
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub evaluations: usize,
    pub appended: Vec<CorrectionSegment>,
    pub discarded: usize,
    pub errors: Vec<Error>,
}

/// Background thread re-evaluating corrections on store changes
pub struct CorrectionWorker {
    sender: Sender<StoreChange>,
    handle: JoinHandle<WorkerReport>,
}

impl CorrectionWorker {
    /// Spawn the worker. `today` is asked for the current date on every run.
    pub fn spawn<F>(coordinator: Arc<CorrectionCoordinator>, today: F) -> Result<Self>
    where
        F: Fn() -> NaiveDate + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("correction-worker".into())
            .spawn(move || run_worker(&coordinator, &receiver, today))?;
        Ok(Self { sender, handle })
    }

    /// Tell the worker an input changed
    pub fn notify(&self, change: StoreChange) -> Result<()> {
        self.sender
            .send(change)
            .map_err(|_| Error::Other("correction worker has stopped".into()))
    }

    /// Stop accepting changes, let pending ones drain, and collect the report
    pub fn shutdown(self) -> Result<WorkerReport> {
        drop(self.sender);
        self.handle
            .join()
            .map_err(|_| Error::Other("correction worker panicked".into()))
    }
}

fn run_worker<F>(
    coordinator: &CorrectionCoordinator,
    receiver: &Receiver<StoreChange>,
    today: F,
) -> WorkerReport
where
    F: Fn() -> NaiveDate,
{
    let mut report = WorkerReport::default();

    while let Ok(change) = receiver.recv() {
        // Coalesce a burst of notifications into one evaluation
        let coalesced = receiver.try_iter().count();
        tracing::debug!("Evaluating after {:?} (+{} coalesced)", change, coalesced);

        report.evaluations += 1;
        match coordinator.run_once(today()) {
            Ok(Evaluation::Appended(segment)) => report.appended.push(segment),
            Ok(Evaluation::Discarded { .. }) => report.discarded += 1,
            Ok(Evaluation::Held) | Ok(Evaluation::NoActiveGoal) => {}
            Err(e) => {
                tracing::error!("Correction evaluation failed: {}", e);
                report.errors.push(e);
            }
        }
    }

    report
}
