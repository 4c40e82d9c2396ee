//! # sprintplan-core
//!
//! Core domain model for the sprintplan sprint planning engine.
//!
//! This crate provides:
//! - Domain types: `Sprint`, `Executor`, `DayOff`, `Task`, `UserStory`
//! - Scheduling outcomes: `Placement`, `Rejection`
//! - The half-day time model: `Slot`, `Period`, `SprintCalendar`
//! - Discipline routing from task titles
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use sprintplan_core::{Discipline, Executor, Sprint, Task};
//!
//! let sprint = Sprint::new(
//!     "2024-Q1-S6",
//!     2024,
//!     1,
//!     NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
//! );
//! let dev = Executor::new("ana@example.com", Discipline::Backend);
//! let task = Task::new(101, "[BE] payment gateway").estimate(6.0).assignee(&dev.email);
//!
//! assert_eq!(task.discipline, Some(Discipline::Backend));
//! assert_eq!(sprint.working_days(), 10);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod calendar;

pub use calendar::{SprintCalendar, SLOT_HOURS};

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier of a task in the upstream tracker
pub type TaskId = u64;

/// Unique identifier of a user story in the upstream tracker
pub type StoryId = u64;

/// Executor identity (email address)
pub type Email = String;

// ============================================================================
// Time Model
// ============================================================================

/// Half of a working day.
///
/// Mornings run 09:00-12:00 and afternoons 14:00-17:00 notionally; only the
/// date and the period are modeled, never clock times.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Morning => write!(f, "morning"),
            Period::Afternoon => write!(f, "afternoon"),
        }
    }
}

/// A half-day working interval within the sprint.
///
/// Slots are totally ordered by (date, period) with morning before afternoon;
/// field order makes the derived `Ord` produce exactly that order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Slot {
    pub date: NaiveDate,
    pub period: Period,
}

impl Slot {
    pub const fn new(date: NaiveDate, period: Period) -> Self {
        Self { date, period }
    }

    pub const fn morning(date: NaiveDate) -> Self {
        Self::new(date, Period::Morning)
    }

    pub const fn afternoon(date: NaiveDate) -> Self {
        Self::new(date, Period::Afternoon)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.period)
    }
}

// ============================================================================
// Disciplines
// ============================================================================

/// The work stream a task and its executors belong to
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Backend,
    Frontend,
    Qa,
    DevOps,
}

impl Discipline {
    pub const ALL: [Discipline; 4] = [
        Discipline::Backend,
        Discipline::Frontend,
        Discipline::Qa,
        Discipline::DevOps,
    ];
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Backend => write!(f, "backend"),
            Discipline::Frontend => write!(f, "frontend"),
            Discipline::Qa => write!(f, "qa"),
            Discipline::DevOps => write!(f, "devops"),
        }
    }
}

impl FromStr for Discipline {
    type Err = UnknownDiscipline;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backend" => Ok(Discipline::Backend),
            "frontend" => Ok(Discipline::Frontend),
            "qa" => Ok(Discipline::Qa),
            "devops" => Ok(Discipline::DevOps),
            other => Err(UnknownDiscipline(other.to_string())),
        }
    }
}

/// A discipline name that is not one of the recognized four
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown discipline: {0}")]
pub struct UnknownDiscipline(pub String);

/// Title classification result: discipline tag plus the test-plan marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TitleTag {
    pub discipline: Option<Discipline>,
    pub test_plan: bool,
}

/// Classify a task title into its discipline and test-plan marker.
///
/// Matching is case-insensitive substring search, in priority order:
/// `[QA]`, `[BE]`, `[FE]`, `DevOps`. The phrase `Plano de Testes` marks a
/// test-plan task. The tag spellings are a wire contract with the upstream
/// board and must not change without a data migration.
pub fn classify_title(title: &str) -> TitleTag {
    let lower = title.to_lowercase();

    let discipline = if lower.contains("[qa]") {
        Some(Discipline::Qa)
    } else if lower.contains("[be]") {
        Some(Discipline::Backend)
    } else if lower.contains("[fe]") {
        Some(Discipline::Frontend)
    } else if lower.contains("devops") {
        Some(Discipline::DevOps)
    } else {
        None
    };

    TitleTag {
        discipline,
        test_plan: lower.contains("plano de testes"),
    }
}

// ============================================================================
// Sprint
// ============================================================================

/// A bounded planning period with fixed start and end dates (both inclusive)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    /// Human-readable sprint name
    pub name: String,
    pub year: i32,
    pub quarter: u8,
    /// First calendar date of the sprint (inclusive)
    pub start: NaiveDate,
    /// Last calendar date of the sprint (inclusive)
    pub end: NaiveDate,
    /// IANA timezone name, used for display only
    pub timezone: String,
}

impl Sprint {
    pub fn new(
        name: impl Into<String>,
        year: i32,
        quarter: u8,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            year,
            quarter,
            start,
            end,
            timezone: "UTC".into(),
        }
    }

    /// Set the display timezone
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    /// Build the working calendar for this sprint window
    pub fn calendar(&self) -> SprintCalendar {
        SprintCalendar::new(self.start, self.end)
    }

    /// Number of working days in the window
    pub fn working_days(&self) -> usize {
        self.calendar().slots().len() / 2
    }
}

// ============================================================================
// Executors and Day-offs
// ============================================================================

/// A person that can be assigned to tasks of exactly one discipline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executor {
    /// Unique identity
    pub email: Email,
    pub discipline: Discipline,
}

impl Executor {
    pub fn new(email: impl Into<Email>, discipline: Discipline) -> Self {
        Self {
            email: email.into(),
            discipline,
        }
    }
}

/// Which part of a day a day-off covers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOffPeriod {
    Full,
    Morning,
    Afternoon,
}

impl fmt::Display for DayOffPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOffPeriod::Full => write!(f, "full"),
            DayOffPeriod::Morning => write!(f, "morning"),
            DayOffPeriod::Afternoon => write!(f, "afternoon"),
        }
    }
}

/// A declared absence of an executor, full-day or half-day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOff {
    pub email: Email,
    pub date: NaiveDate,
    pub period: DayOffPeriod,
}

impl DayOff {
    pub fn new(email: impl Into<Email>, date: NaiveDate, period: DayOffPeriod) -> Self {
        Self {
            email: email.into(),
            date,
            period,
        }
    }
}

// ============================================================================
// Tasks and User Stories
// ============================================================================

/// Lifecycle state of a work item in the upstream tracker
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    #[default]
    Active,
    Closed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::New => write!(f, "new"),
            TaskState::Active => write!(f, "active"),
            TaskState::Closed => write!(f, "closed"),
        }
    }
}

/// A leaf work item with an estimate and at most one assignee.
///
/// Tasks are produced by the normalizer from upstream records and are
/// read-only afterwards; `Task::new` classifies the title so the discipline
/// tag and test-plan marker are always consistent with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Discipline derived from the title tag; `None` means no tag matched
    pub discipline: Option<Discipline>,
    /// Title carries the test-plan phrase (meaningful only under qa)
    pub test_plan: bool,
    /// Original estimate in hours; absent is tolerated only for test plans
    pub estimate_hours: Option<f64>,
    /// Email of the assigned executor, if any
    pub assignee: Option<Email>,
    /// Parent user story, if any
    pub story_id: Option<StoryId>,
    pub state: TaskState,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        let title = title.into();
        let tag = classify_title(&title);
        Self {
            id,
            title,
            discipline: tag.discipline,
            test_plan: tag.test_plan,
            estimate_hours: None,
            assignee: None,
            story_id: None,
            state: TaskState::Active,
        }
    }

    /// Set the original estimate in hours
    pub fn estimate(mut self, hours: f64) -> Self {
        self.estimate_hours = Some(hours);
        self
    }

    /// Assign an executor by email
    pub fn assignee(mut self, email: impl Into<Email>) -> Self {
        self.assignee = Some(email.into());
        self
    }

    /// Attach to a parent user story
    pub fn story(mut self, story_id: StoryId) -> Self {
        self.story_id = Some(story_id);
        self
    }

    /// Set the lifecycle state
    pub fn state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    /// Closed tasks are history: never placed, never rejected
    pub fn is_closed(&self) -> bool {
        self.state == TaskState::Closed
    }

    /// A qa task dedicated to test documentation, scheduled before other work
    pub fn is_test_plan(&self) -> bool {
        self.test_plan && self.discipline == Some(Discipline::Qa)
    }
}

/// A parent work item grouping related tasks under a shared business outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStory {
    pub id: StoryId,
    pub title: String,
    pub area_path: String,
    /// Sprint/iteration label as carried by the tracker
    pub sprint: String,
    /// Child task ids, ascending
    pub tasks: Vec<TaskId>,
}

impl UserStory {
    pub fn new(id: StoryId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            area_path: String::new(),
            sprint: String::new(),
            tasks: Vec::new(),
        }
    }

    pub fn area_path(mut self, path: impl Into<String>) -> Self {
        self.area_path = path.into();
        self
    }

    pub fn child(mut self, task_id: TaskId) -> Self {
        self.tasks.push(task_id);
        self
    }
}

// ============================================================================
// Scheduling Outcomes
// ============================================================================

/// A committed assignment of a task to an executor and a working interval.
///
/// Immutable once produced by the scheduler. `start` and `end` are both
/// inclusive; a zero-hour task has `start == end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub task_id: TaskId,
    pub executor: Email,
    pub start: Slot,
    pub end: Slot,
}

/// Why a task could not be placed.
///
/// Reasons are mutually exclusive; the first applicable one in the
/// scheduler's check order wins. The kebab-case spellings are part of the
/// report format.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    /// No assignee, or the assignee is not in the task's discipline pool
    NoExecutor,
    /// A prerequisite is itself unplaced, so the task can never start
    MissingDependency,
    /// The task participates in a dependency cycle
    DependencyCycle,
    /// The task cannot finish inside the sprint window
    OutOfWindow,
    /// The executor has no remaining capacity in the window
    NoCapacity,
    /// A non-test-plan task without an original estimate
    NoEstimate,
    /// The title matches none of the discipline tags
    UnknownDiscipline,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoExecutor => write!(f, "no-executor"),
            RejectionReason::MissingDependency => write!(f, "missing-dependency"),
            RejectionReason::DependencyCycle => write!(f, "dependency-cycle"),
            RejectionReason::OutOfWindow => write!(f, "out-of-window"),
            RejectionReason::NoCapacity => write!(f, "no-capacity"),
            RejectionReason::NoEstimate => write!(f, "no-estimate"),
            RejectionReason::UnknownDiscipline => write!(f, "unknown-discipline"),
        }
    }
}

/// A structured record stating why a task could not be placed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub task_id: TaskId,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new(task_id: TaskId, reason: RejectionReason) -> Self {
        Self { task_id, reason }
    }
}

/// A prerequisite relation: `successor` may only start once `prerequisite`
/// has ended
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DependencyEdge {
    pub successor: TaskId,
    pub prerequisite: TaskId,
}

// ============================================================================
// Errors
// ============================================================================

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn slot_order_morning_before_afternoon() {
        let d = date(2024, 3, 18);
        assert!(Slot::morning(d) < Slot::afternoon(d));
        assert!(Slot::afternoon(d) < Slot::morning(date(2024, 3, 19)));
    }

    #[test]
    fn classify_title_priority_order() {
        // [QA] wins over other tags appearing later in the title
        let tag = classify_title("[QA][BE] integration checks");
        assert_eq!(tag.discipline, Some(Discipline::Qa));

        assert_eq!(
            classify_title("[be] payment gateway").discipline,
            Some(Discipline::Backend)
        );
        assert_eq!(
            classify_title("[FE] checkout form").discipline,
            Some(Discipline::Frontend)
        );
        assert_eq!(
            classify_title("DevOps pipeline for staging").discipline,
            Some(Discipline::DevOps)
        );
        assert_eq!(classify_title("untagged chore").discipline, None);
    }

    #[test]
    fn classify_title_test_plan_phrase() {
        let tag = classify_title("[QA] Plano de Testes - checkout");
        assert_eq!(tag.discipline, Some(Discipline::Qa));
        assert!(tag.test_plan);

        // Case-insensitive
        assert!(classify_title("[qa] plano de testes").test_plan);
        assert!(!classify_title("[QA] test cases").test_plan);
    }

    #[test]
    fn test_plan_requires_qa_discipline() {
        // The phrase without a qa tag does not make a schedulable test plan
        let task = Task::new(7, "[BE] Plano de Testes do gateway");
        assert!(task.test_plan);
        assert!(!task.is_test_plan());

        let qa = Task::new(8, "[QA] Plano de Testes");
        assert!(qa.is_test_plan());
    }

    #[test]
    fn task_builder_classifies_title() {
        let task = Task::new(42, "[FE] settings page")
            .estimate(5.5)
            .assignee("bea@example.com")
            .story(7);

        assert_eq!(task.discipline, Some(Discipline::Frontend));
        assert_eq!(task.estimate_hours, Some(5.5));
        assert_eq!(task.assignee.as_deref(), Some("bea@example.com"));
        assert_eq!(task.story_id, Some(7));
        assert_eq!(task.state, TaskState::Active);
    }

    #[test]
    fn discipline_wire_spellings() {
        for d in Discipline::ALL {
            assert_eq!(d.to_string().parse::<Discipline>().unwrap(), d);
        }
        assert!("design".parse::<Discipline>().is_err());
    }

    #[test]
    fn rejection_reason_serde_spellings() {
        let json = serde_json::to_string(&RejectionReason::MissingDependency).unwrap();
        assert_eq!(json, "\"missing-dependency\"");
        let back: RejectionReason = serde_json::from_str("\"out-of-window\"").unwrap();
        assert_eq!(back, RejectionReason::OutOfWindow);
    }

    #[test]
    fn sprint_working_days_excludes_weekends() {
        // 2024-03-18 (Mon) .. 2024-03-29 (Fri): two full weeks
        let sprint = Sprint::new("S6", 2024, 1, date(2024, 3, 18), date(2024, 3, 29));
        assert_eq!(sprint.working_days(), 10);
    }
}
