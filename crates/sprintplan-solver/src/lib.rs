//! # sprintplan-solver
//!
//! Sprint scheduler: capacity model, dependency resolution, placement policy
//! and user-story rollup.
//!
//! The pass is single-threaded and sequential; every placement debits the
//! shared capacity ledger, so the result depends on the fixed priority order
//! (test-plan tasks first, then ascending task id). Given the same
//! normalized input, the schedule is byte-identical.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use sprintplan_core::{Discipline, Executor, Sprint, Task};
//! use sprintplan_solver::SprintScheduler;
//!
//! let sprint = Sprint::new(
//!     "S6",
//!     2024,
//!     1,
//!     NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
//! );
//! let executors = vec![Executor::new("ana@x", Discipline::Backend)];
//! let tasks = vec![Task::new(1, "[BE] wire the gateway").estimate(3.0).assignee("ana@x")];
//!
//! let scheduler = SprintScheduler::new(&sprint, &executors, &[], Default::default());
//! let schedule = scheduler.schedule(&tasks).unwrap();
//! assert!(schedule.placements.contains_key(&1));
//! ```

use std::collections::BTreeMap;

use sprintplan_core::{
    DayOff, DependencyEdge, Discipline, Email, Executor, Placement, Rejection, RejectionReason,
    Slot, Sprint, SprintCalendar, Task, TaskId,
};
use thiserror::Error;
use tracing::{debug, info};

pub mod capacity;
pub mod graph;
pub mod stories;

pub use capacity::{CapacityError, CapacityLedger};
pub use graph::DependencyGraph;
pub use stories::{aggregate_stories, story_points, StorySummary};

/// Internal scheduling failure.
///
/// Per-task problems are data ([`Rejection`]), never errors; the only way a
/// pass can fail is a ledger inconsistency between the placement scan and
/// its commit.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("capacity ledger inconsistency: {0}")]
    Capacity(#[from] CapacityError),
}

/// The frozen outcome of a scheduling pass.
///
/// Every schedulable task lands in exactly one of `placements` or
/// `rejections`; closed tasks appear in neither.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SprintSchedule {
    /// Committed placements, keyed by task id
    pub placements: BTreeMap<TaskId, Placement>,
    /// Rejections in ascending task id order
    pub rejections: Vec<Rejection>,
    /// Resolved dependency edges, for the report
    pub edges: Vec<DependencyEdge>,
}

impl SprintSchedule {
    /// Rejections grouped by reason, groups and members in stable order
    pub fn rejections_by_reason(&self) -> BTreeMap<RejectionReason, Vec<TaskId>> {
        let mut grouped: BTreeMap<RejectionReason, Vec<TaskId>> = BTreeMap::new();
        for rejection in &self.rejections {
            grouped.entry(rejection.reason).or_default().push(rejection.task_id);
        }
        grouped
    }
}

/// Sequential sprint scheduler.
///
/// Holds the read-only planning inputs; the mutable capacity ledger lives
/// only inside a `schedule` call.
pub struct SprintScheduler {
    calendar: SprintCalendar,
    executors: BTreeMap<Email, Discipline>,
    dayoffs: Vec<DayOff>,
    dependencies: BTreeMap<TaskId, Vec<TaskId>>,
}

impl SprintScheduler {
    pub fn new(
        sprint: &Sprint,
        executors: &[Executor],
        dayoffs: &[DayOff],
        dependencies: BTreeMap<TaskId, Vec<TaskId>>,
    ) -> Self {
        Self {
            calendar: sprint.calendar(),
            executors: executors
                .iter()
                .map(|e| (e.email.clone(), e.discipline))
                .collect(),
            dayoffs: dayoffs.to_vec(),
            dependencies,
        }
    }

    /// Roster used for ledger seeding
    fn roster(&self) -> Vec<Executor> {
        self.executors
            .iter()
            .map(|(email, discipline)| Executor::new(email.clone(), *discipline))
            .collect()
    }

    /// Run the scheduling pass over the normalized task set.
    ///
    /// Closed tasks are treated as already complete: they are neither placed
    /// nor rejected, and prerequisites pointing at them are satisfied at
    /// sprint start.
    pub fn schedule(&self, tasks: &[Task]) -> Result<SprintSchedule, ScheduleError> {
        let graph = DependencyGraph::build(&self.dependencies, tasks);
        let roster = self.roster();
        let mut ledger = CapacityLedger::new(&self.calendar, &roster, &self.dayoffs);

        let mut placements: BTreeMap<TaskId, Placement> = BTreeMap::new();
        let mut rejected: BTreeMap<TaskId, RejectionReason> = BTreeMap::new();

        // Cycle members are diagnosed once, before any placement
        for task_id in graph.cycle_members() {
            rejected.insert(task_id, RejectionReason::DependencyCycle);
        }

        // Priority: test-plan tasks ascending id, then everything ascending id
        let mut order: Vec<&Task> = tasks.iter().filter(|t| !t.is_closed()).collect();
        order.sort_by_key(|t| (!t.is_test_plan(), t.id));

        for task in order {
            if rejected.contains_key(&task.id) {
                continue;
            }
            match self.place(task, &graph, &placements, &ledger) {
                Ok((placement, takes)) => {
                    for (slot, hours) in &takes {
                        ledger.consume(&placement.executor, *slot, *hours)?;
                    }
                    debug!(
                        task = task.id,
                        executor = %placement.executor,
                        start = %placement.start,
                        end = %placement.end,
                        "task placed"
                    );
                    placements.insert(task.id, placement);
                }
                Err(reason) => {
                    debug!(task = task.id, %reason, "task rejected");
                    rejected.insert(task.id, reason);
                }
            }
        }

        let rejections: Vec<Rejection> = rejected
            .into_iter()
            .map(|(task_id, reason)| Rejection::new(task_id, reason))
            .collect();

        info!(
            placed = placements.len(),
            rejected = rejections.len(),
            "scheduling pass finished"
        );

        Ok(SprintSchedule {
            placements,
            rejections,
            edges: graph.edges().to_vec(),
        })
    }

    /// Try to place one task; the first failing check decides the reason.
    ///
    /// The ledger is only read here. On success the caller gets the
    /// placement plus the per-slot hours to debit, so the commit happens in
    /// one place and only after the whole estimate fits.
    fn place(
        &self,
        task: &Task,
        graph: &DependencyGraph,
        placements: &BTreeMap<TaskId, Placement>,
        ledger: &CapacityLedger,
    ) -> Result<(Placement, Vec<(Slot, f64)>), RejectionReason> {
        // ── Pre-checks ──────────────────────────────────────────────────
        let assignee = task.assignee.as_ref().ok_or(RejectionReason::NoExecutor)?;
        let discipline = task.discipline.ok_or(RejectionReason::UnknownDiscipline)?;
        match self.executors.get(assignee) {
            Some(pool) if *pool == discipline => {}
            _ => return Err(RejectionReason::NoExecutor),
        }
        let estimate = match task.estimate_hours {
            Some(hours) => hours,
            None if task.is_test_plan() => 0.0,
            None => return Err(RejectionReason::NoEstimate),
        };

        // ── Earliest start ──────────────────────────────────────────────
        // t0 is the first slot at which every prerequisite has ended; a
        // prerequisite may end in the same slot the successor starts.
        let mut t0 = self
            .calendar
            .first_slot()
            .ok_or(RejectionReason::OutOfWindow)?;
        for prereq in graph.prerequisites(task.id) {
            match placements.get(&prereq) {
                Some(placed) => t0 = t0.max(placed.end),
                None => return Err(RejectionReason::MissingDependency),
            }
        }

        // Zero-hour tasks occupy their earliest-start slot and consume nothing
        if estimate <= 0.0 {
            let placement = Placement {
                task_id: task.id,
                executor: assignee.clone(),
                start: t0,
                end: t0,
            };
            return Ok((placement, Vec::new()));
        }

        // ── Placement scan ──────────────────────────────────────────────
        // Greedily take hours slot by slot; nothing is committed until the
        // whole estimate fits.
        let mut needed = estimate;
        let mut takes: Vec<(Slot, f64)> = Vec::new();
        for slot in self.calendar.slots_from(t0) {
            let available = ledger.remaining(assignee, slot);
            if available <= 0.0 {
                continue;
            }
            let take = available.min(needed);
            takes.push((slot, take));
            needed -= take;
            if needed <= 1e-9 {
                break;
            }
        }

        if needed > 1e-9 {
            if ledger.total_remaining(assignee) <= 0.0 {
                return Err(RejectionReason::NoCapacity);
            }
            return Err(RejectionReason::OutOfWindow);
        }

        let start = takes.first().map(|(slot, _)| *slot).unwrap_or(t0);
        let end = takes.last().map(|(slot, _)| *slot).unwrap_or(t0);
        let placement = Placement {
            task_id: task.id,
            executor: assignee.clone(),
            start,
            end,
        };
        Ok((placement, takes))
    }
}
