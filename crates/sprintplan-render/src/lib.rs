//! # sprintplan-render
//!
//! Shapes the scheduling outcome into a structured, rendering-agnostic
//! report record and renders it to plain text.
//!
//! The [`SprintReport`] is fully serializable; every field of every
//! placement and rejection survives a round trip through it, so the record
//! can be archived as JSON and rendered later.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sprintplan_core::{
    DayOff, DayOffPeriod, DependencyEdge, Email, Placement, Rejection, RejectionReason, Slot,
    Sprint, SprintCalendar, Task, TaskId,
};
use sprintplan_solver::{SprintSchedule, StorySummary};

pub mod text;

pub use text::TextRenderer;

pub use sprintplan_core::RenderError;

/// Output rendering abstraction
pub trait Renderer {
    type Output;

    fn render(&self, report: &SprintReport) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Report Record
// ============================================================================

/// The complete, rendering-agnostic result of a planning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SprintReport {
    pub sprint: Sprint,
    /// Aggregated stories, ascending story id
    pub stories: Vec<StorySummary>,
    /// Every committed placement, ascending task id
    pub placements: Vec<PlacementRow>,
    /// Inside-window day-offs grouped per executor
    pub dayoffs: Vec<DayOffSummary>,
    /// Resolved dependency edges
    pub dependencies: Vec<DependencyEdge>,
    /// Rejections grouped by reason, stable order
    pub rejections: Vec<RejectionGroup>,
}

/// One placement enriched with title and hours for display
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRow {
    pub task_id: TaskId,
    pub title: String,
    pub executor: Email,
    pub start: Slot,
    pub end: Slot,
    pub hours: f64,
}

impl PlacementRow {
    /// Recover the underlying placement record
    pub fn placement(&self) -> Placement {
        Placement {
            task_id: self.task_id,
            executor: self.executor.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// One executor's absences inside the sprint window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOffSummary {
    pub email: Email,
    pub absences: Vec<Absence>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absence {
    pub date: NaiveDate,
    pub period: DayOffPeriod,
}

/// All tasks rejected for one reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionGroup {
    pub reason: RejectionReason,
    pub tasks: Vec<RejectedTask>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTask {
    pub task_id: TaskId,
    pub title: String,
}

impl SprintReport {
    /// Shape the report from the scheduling outcome.
    ///
    /// `tasks` is the normalized task set (titles and hours are looked up
    /// there); `summaries` comes from the story aggregator.
    pub fn assemble(
        sprint: &Sprint,
        tasks: &[Task],
        summaries: &[StorySummary],
        schedule: &SprintSchedule,
        dayoffs: &[DayOff],
    ) -> Self {
        let title_of = |id: TaskId| -> String {
            tasks
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.title.clone())
                .unwrap_or_default()
        };

        let placements = schedule
            .placements
            .values()
            .map(|p| PlacementRow {
                task_id: p.task_id,
                title: title_of(p.task_id),
                executor: p.executor.clone(),
                start: p.start,
                end: p.end,
                hours: tasks
                    .iter()
                    .find(|t| t.id == p.task_id)
                    .and_then(|t| t.estimate_hours)
                    .unwrap_or(0.0),
            })
            .collect();

        // Only absences that touch a working day inside the window
        let mut dayoff_summaries: Vec<DayOffSummary> = Vec::new();
        let mut sorted_dayoffs: Vec<&DayOff> = dayoffs
            .iter()
            .filter(|d| d.date >= sprint.start && d.date <= sprint.end)
            .filter(|d| SprintCalendar::is_working_day(d.date))
            .collect();
        sorted_dayoffs.sort_by(|a, b| (&a.email, a.date, a.period).cmp(&(&b.email, b.date, b.period)));
        for dayoff in sorted_dayoffs {
            let absence = Absence {
                date: dayoff.date,
                period: dayoff.period,
            };
            match dayoff_summaries.last_mut() {
                Some(summary) if summary.email == dayoff.email => summary.absences.push(absence),
                _ => dayoff_summaries.push(DayOffSummary {
                    email: dayoff.email.clone(),
                    absences: vec![absence],
                }),
            }
        }

        let rejections = schedule
            .rejections_by_reason()
            .into_iter()
            .map(|(reason, task_ids)| RejectionGroup {
                reason,
                tasks: task_ids
                    .into_iter()
                    .map(|task_id| RejectedTask {
                        task_id,
                        title: title_of(task_id),
                    })
                    .collect(),
            })
            .collect();

        Self {
            sprint: sprint.clone(),
            stories: summaries.to_vec(),
            placements,
            dayoffs: dayoff_summaries,
            dependencies: schedule.edges.clone(),
            rejections,
        }
    }

    /// Flatten the grouped rejections back to individual records
    pub fn rejections_flat(&self) -> Vec<Rejection> {
        let mut flat: Vec<Rejection> = self
            .rejections
            .iter()
            .flat_map(|group| {
                group
                    .tasks
                    .iter()
                    .map(|t| Rejection::new(t.task_id, group.reason))
            })
            .collect();
        flat.sort_by_key(|r| r.task_id);
        flat
    }
}
