//! # sprintplan-config
//!
//! The four on-disk configuration documents, all TOML:
//!
//! - `setup.toml`: sprint identity and window, tracker endpoint, output dir
//! - `executors.toml`: discipline -> executor emails
//! - `dayoffs.toml`: executor email -> list of absences
//! - `dependencies.toml`: successor task id -> prerequisite task ids
//!
//! Every loader comes as a `load` (file) / `from_str` (string) pair and
//! validates on the way in; any [`ConfigError`] is fatal and stops the run
//! before scheduling begins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use sprintplan_core::{DayOff, DayOffPeriod, Discipline, Executor, Sprint, TaskId};
use thiserror::Error;

/// Configuration load or validation failure (always fatal)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid date in {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("sprint window is empty: start {start} is after end {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },

    #[error("invalid quarter {0} (expected 1..=4)")]
    InvalidQuarter(u8),

    #[error("unknown discipline in executors document: {0}")]
    UnknownDiscipline(String),

    #[error("executor {0} appears in more than one discipline pool")]
    DuplicateExecutor(String),

    #[error("invalid day-off period: {0} (expected full, morning or afternoon)")]
    InvalidPeriod(String),

    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("invalid task id in dependencies document: {0}")]
    InvalidTaskId(String),
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_toml<T: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

// ============================================================================
// Setup
// ============================================================================

/// Validated contents of `setup.toml`
#[derive(Clone, Debug, PartialEq)]
pub struct Setup {
    pub sprint: Sprint,
    pub tracker: TrackerSettings,
    pub output_dir: PathBuf,
}

/// Where and what to fetch from the upstream tracker
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Project collection base URL
    pub base_url: String,
    /// Area path scoping the team's work items
    pub area_path: String,
}

#[derive(Debug, Deserialize)]
struct SetupDoc {
    sprint: SprintDoc,
    tracker: TrackerDoc,
    #[serde(default)]
    output: OutputDoc,
}

#[derive(Debug, Deserialize)]
struct SprintDoc {
    name: String,
    year: i32,
    quarter: u8,
    start_date: String,
    end_date: String,
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Deserialize)]
struct TrackerDoc {
    base_url: String,
    area_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct OutputDoc {
    directory: Option<PathBuf>,
}

impl Setup {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        Self::parse(path, &read_file(path)?)
    }

    pub fn parse_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(Path::new("<inline>"), raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let doc: SetupDoc = parse_toml(path, raw)?;

        let start = parse_date("sprint.start_date", &doc.sprint.start_date)?;
        let end = parse_date("sprint.end_date", &doc.sprint.end_date)?;
        if start > end {
            return Err(ConfigError::EmptyWindow { start, end });
        }
        if !(1..=4).contains(&doc.sprint.quarter) {
            return Err(ConfigError::InvalidQuarter(doc.sprint.quarter));
        }

        Ok(Self {
            sprint: Sprint::new(doc.sprint.name, doc.sprint.year, doc.sprint.quarter, start, end)
                .timezone(doc.sprint.timezone),
            tracker: TrackerSettings {
                base_url: doc.tracker.base_url,
                area_path: doc.tracker.area_path,
            },
            output_dir: doc.output.directory.unwrap_or_else(|| PathBuf::from("reports")),
        })
    }
}

// ============================================================================
// Executors
// ============================================================================

/// Load `executors.toml`: a table of discipline -> email list
pub fn load_executors(path: impl AsRef<Path>) -> Result<Vec<Executor>, ConfigError> {
    let path = path.as_ref();
    executors_from_str_at(path, &read_file(path)?)
}

pub fn executors_from_str(raw: &str) -> Result<Vec<Executor>, ConfigError> {
    executors_from_str_at(Path::new("<inline>"), raw)
}

fn executors_from_str_at(path: &Path, raw: &str) -> Result<Vec<Executor>, ConfigError> {
    // Keys arrive sorted out of the BTreeMap, so pool order is stable
    let doc: BTreeMap<String, Vec<String>> = parse_toml(path, raw)?;

    let mut executors: Vec<Executor> = Vec::new();
    for (name, emails) in &doc {
        let discipline = Discipline::from_str(name)
            .map_err(|e| ConfigError::UnknownDiscipline(e.0))?;
        for email in emails {
            if executors.iter().any(|e| &e.email == email) {
                return Err(ConfigError::DuplicateExecutor(email.clone()));
            }
            executors.push(Executor::new(email.clone(), discipline));
        }
    }
    Ok(executors)
}

// ============================================================================
// Day-offs
// ============================================================================

#[derive(Debug, Deserialize)]
struct DayOffEntry {
    date: String,
    period: String,
}

/// Load `dayoffs.toml`: a table of email -> absence list
pub fn load_dayoffs(path: impl AsRef<Path>) -> Result<Vec<DayOff>, ConfigError> {
    let path = path.as_ref();
    dayoffs_from_str_at(path, &read_file(path)?)
}

pub fn dayoffs_from_str(raw: &str) -> Result<Vec<DayOff>, ConfigError> {
    dayoffs_from_str_at(Path::new("<inline>"), raw)
}

fn dayoffs_from_str_at(path: &Path, raw: &str) -> Result<Vec<DayOff>, ConfigError> {
    let doc: BTreeMap<String, Vec<DayOffEntry>> = parse_toml(path, raw)?;

    let mut dayoffs = Vec::new();
    for (email, entries) in &doc {
        for entry in entries {
            let date = parse_date(&format!("dayoffs.{email}"), &entry.date)?;
            let period = match entry.period.as_str() {
                "full" => DayOffPeriod::Full,
                "morning" => DayOffPeriod::Morning,
                "afternoon" => DayOffPeriod::Afternoon,
                other => return Err(ConfigError::InvalidPeriod(other.to_string())),
            };
            dayoffs.push(DayOff::new(email.clone(), date, period));
        }
    }
    Ok(dayoffs)
}

// ============================================================================
// Dependencies
// ============================================================================

/// Load `dependencies.toml`: a table of successor id -> prerequisite ids.
///
/// Self-edges are rejected; duplicate prerequisites are collapsed.
pub fn load_dependencies(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<TaskId, Vec<TaskId>>, ConfigError> {
    let path = path.as_ref();
    dependencies_from_str_at(path, &read_file(path)?)
}

pub fn dependencies_from_str(raw: &str) -> Result<BTreeMap<TaskId, Vec<TaskId>>, ConfigError> {
    dependencies_from_str_at(Path::new("<inline>"), raw)
}

fn dependencies_from_str_at(
    path: &Path,
    raw: &str,
) -> Result<BTreeMap<TaskId, Vec<TaskId>>, ConfigError> {
    let doc: BTreeMap<String, Vec<TaskId>> = parse_toml(path, raw)?;

    let mut dependencies = BTreeMap::new();
    for (key, prereqs) in doc {
        let successor: TaskId = key
            .parse()
            .map_err(|_| ConfigError::InvalidTaskId(key.clone()))?;

        let mut unique = prereqs;
        unique.sort_unstable();
        unique.dedup();
        if unique.contains(&successor) {
            return Err(ConfigError::SelfDependency(successor));
        }
        dependencies.insert(successor, unique);
    }
    Ok(dependencies)
}

// ============================================================================
// Bundle
// ============================================================================

/// All four documents loaded from one configuration directory
#[derive(Clone, Debug)]
pub struct ConfigBundle {
    pub setup: Setup,
    pub executors: Vec<Executor>,
    pub dayoffs: Vec<DayOff>,
    pub dependencies: BTreeMap<TaskId, Vec<TaskId>>,
}

impl ConfigBundle {
    /// Load `setup.toml`, `executors.toml`, `dayoffs.toml` and
    /// `dependencies.toml` from `dir`. The day-off and dependency documents
    /// are optional; absent files mean empty documents.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();

        let setup = Setup::load(dir.join("setup.toml"))?;
        let executors = load_executors(dir.join("executors.toml"))?;

        let dayoffs_path = dir.join("dayoffs.toml");
        let dayoffs = if dayoffs_path.exists() {
            load_dayoffs(dayoffs_path)?
        } else {
            Vec::new()
        };

        let dependencies_path = dir.join("dependencies.toml");
        let dependencies = if dependencies_path.exists() {
            load_dependencies(dependencies_path)?
        } else {
            BTreeMap::new()
        };

        tracing::info!(
            sprint = %setup.sprint.name,
            executors = executors.len(),
            dayoffs = dayoffs.len(),
            dependency_edges = dependencies.values().map(Vec::len).sum::<usize>(),
            "configuration loaded"
        );

        Ok(Self {
            setup,
            executors,
            dayoffs,
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn setup_parses_window_and_tracker() {
        let setup = Setup::parse_str(
            r#"
            [sprint]
            name = "2024-Q1-S6"
            year = 2024
            quarter = 1
            start_date = "2024-03-18"
            end_date = "2024-03-29"
            timezone = "America/Sao_Paulo"

            [tracker]
            base_url = "https://tracker.example.com/acme"
            area_path = "Acme\\Checkout"

            [output]
            directory = "out"
            "#,
        )
        .unwrap();

        assert_eq!(setup.sprint.name, "2024-Q1-S6");
        assert_eq!(setup.sprint.working_days(), 10);
        assert_eq!(setup.sprint.timezone, "America/Sao_Paulo");
        assert_eq!(setup.tracker.area_path, "Acme\\Checkout");
        assert_eq!(setup.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn setup_rejects_invalid_dates() {
        let err = Setup::parse_str(
            r#"
            [sprint]
            name = "s"
            year = 2024
            quarter = 1
            start_date = "18/03/2024"
            end_date = "2024-03-29"

            [tracker]
            base_url = "https://x"
            area_path = "A"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { .. }));
    }

    #[test]
    fn setup_rejects_inverted_window() {
        let err = Setup::parse_str(
            r#"
            [sprint]
            name = "s"
            year = 2024
            quarter = 2
            start_date = "2024-03-29"
            end_date = "2024-03-18"

            [tracker]
            base_url = "https://x"
            area_path = "A"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyWindow { .. }));
    }

    #[test]
    fn executors_parse_all_four_pools() {
        let executors = executors_from_str(
            r#"
            backend = ["ana@x", "bruno@x"]
            frontend = ["bia@x"]
            qa = ["caio@x"]
            devops = ["dani@x"]
            "#,
        )
        .unwrap();

        assert_eq!(executors.len(), 5);
        let ana = executors.iter().find(|e| e.email == "ana@x").unwrap();
        assert_eq!(ana.discipline, Discipline::Backend);
    }

    #[test]
    fn executors_reject_unknown_discipline() {
        let err = executors_from_str(r#"design = ["d@x"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDiscipline(name) if name == "design"));
    }

    #[test]
    fn executors_reject_duplicates_across_pools() {
        let err = executors_from_str(
            r#"
            backend = ["ana@x"]
            qa = ["ana@x"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateExecutor(email) if email == "ana@x"));
    }

    #[test]
    fn dayoffs_parse_periods() {
        let dayoffs = dayoffs_from_str(
            r#"
            [["ana@x"]]
            date = "2024-03-18"
            period = "full"

            [["ana@x"]]
            date = "2024-03-19"
            period = "morning"
            "#,
        )
        .unwrap();

        assert_eq!(dayoffs.len(), 2);
        assert_eq!(dayoffs[0].period, DayOffPeriod::Full);
        assert_eq!(dayoffs[1].period, DayOffPeriod::Morning);
    }

    #[test]
    fn dayoffs_reject_unknown_period() {
        let err = dayoffs_from_str(
            r#"
            [["ana@x"]]
            date = "2024-03-18"
            period = "evening"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod(p) if p == "evening"));
    }

    #[test]
    fn dependencies_dedupe_and_reject_self_edges() {
        let deps = dependencies_from_str(r#""10" = [7, 7, 8]"#).unwrap();
        assert_eq!(deps[&10], vec![7, 8]);

        let err = dependencies_from_str(r#""10" = [10]"#).unwrap_err();
        assert!(matches!(err, ConfigError::SelfDependency(10)));
    }

    #[test]
    fn dependencies_reject_non_numeric_keys() {
        let err = dependencies_from_str(r#""abc" = [1]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTaskId(k) if k == "abc"));
    }
}
