//! Raw work items -> internal `Task` / `UserStory` records.
//!
//! Normalization is lossy on purpose: unknown item types are skipped with a
//! warning, unknown states fold to `active`, and anything the scheduler must
//! judge (missing estimate, missing assignee, unmatched title tag) is kept
//! as-is so the rejection carries the precise reason.

use std::collections::BTreeMap;

use sprintplan_core::{Task, TaskState, UserStory};
use tracing::warn;

use crate::RawWorkItem;

/// The normalized snapshot the scheduler consumes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Backlog {
    /// Tasks in ascending id order
    pub tasks: Vec<Task>,
    /// Stories in ascending id order, child lists ascending
    pub stories: Vec<UserStory>,
}

/// Fold a raw state string; anything unrecognized counts as active
fn fold_state(raw: &str) -> TaskState {
    match raw.to_lowercase().as_str() {
        "new" => TaskState::New,
        "closed" => TaskState::Closed,
        "active" => TaskState::Active,
        other => {
            if !other.is_empty() {
                warn!(state = other, "unrecognized work-item state treated as active");
            }
            TaskState::Active
        }
    }
}

/// Convert the raw snapshot into the internal model.
///
/// Title classification happens in `Task::new`; parent links are wired both
/// ways (task -> story id, story -> ascending child list).
pub fn normalize(items: &[RawWorkItem]) -> Backlog {
    let mut tasks: Vec<Task> = Vec::new();
    let mut stories: BTreeMap<u64, UserStory> = BTreeMap::new();

    for item in items {
        match item.fields.item_type.to_lowercase().as_str() {
            "user story" => {
                let mut story = UserStory::new(item.id, item.fields.title.clone())
                    .area_path(item.fields.area_path.clone());
                story.sprint = item.fields.iteration_path.clone();
                stories.insert(item.id, story);
            }
            "task" => {
                let mut task =
                    Task::new(item.id, item.fields.title.clone()).state(fold_state(&item.fields.state));
                if let Some(hours) = item.fields.original_estimate {
                    task = task.estimate(hours);
                }
                if let Some(identity) = &item.fields.assigned_to {
                    task = task.assignee(identity.unique_name.clone());
                }
                if let Some(parent) = item.fields.parent {
                    task = task.story(parent);
                }
                tasks.push(task);
            }
            other => {
                warn!(id = item.id, item_type = other, "unsupported work-item type skipped");
            }
        }
    }

    tasks.sort_by_key(|t| t.id);

    // Wire children; a parent that is not a story in the snapshot is kept on
    // the task (it just aggregates to nothing) but flagged in the log.
    for task in &tasks {
        if let Some(parent) = task.story_id {
            match stories.get_mut(&parent) {
                Some(story) => story.tasks.push(task.id),
                None => warn!(task = task.id, parent, "parent story not in snapshot"),
            }
        }
    }

    Backlog {
        tasks,
        stories: stories.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawFields, RawIdentity};
    use pretty_assertions::assert_eq;
    use sprintplan_core::Discipline;

    fn raw_task(id: u64, title: &str, parent: Option<u64>) -> RawWorkItem {
        RawWorkItem {
            id,
            fields: RawFields {
                title: title.into(),
                item_type: "Task".into(),
                state: "Active".into(),
                assigned_to: Some(RawIdentity {
                    unique_name: "ana@acme.com".into(),
                }),
                original_estimate: Some(4.0),
                parent,
                ..RawFields::default()
            },
        }
    }

    fn raw_story(id: u64, title: &str) -> RawWorkItem {
        RawWorkItem {
            id,
            fields: RawFields {
                title: title.into(),
                item_type: "User Story".into(),
                state: "Active".into(),
                ..RawFields::default()
            },
        }
    }

    #[test]
    fn tasks_and_stories_are_partitioned_and_sorted() {
        let items = vec![
            raw_task(12, "[BE] later", Some(10)),
            raw_story(10, "Checkout"),
            raw_task(11, "[FE] earlier", Some(10)),
        ];

        let backlog = normalize(&items);

        assert_eq!(backlog.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![11, 12]);
        assert_eq!(backlog.stories.len(), 1);
        assert_eq!(backlog.stories[0].tasks, vec![11, 12]);
    }

    #[test]
    fn title_classification_is_applied() {
        let backlog = normalize(&[raw_task(1, "[QA] Plano de Testes", None)]);
        let task = &backlog.tasks[0];
        assert_eq!(task.discipline, Some(Discipline::Qa));
        assert!(task.is_test_plan());
    }

    #[test]
    fn unknown_states_fold_to_active() {
        let mut item = raw_task(1, "[BE] odd state", None);
        item.fields.state = "Resolved".into();
        let backlog = normalize(&[item]);
        assert_eq!(backlog.tasks[0].state, TaskState::Active);
    }

    #[test]
    fn closed_state_is_preserved() {
        let mut item = raw_task(1, "[BE] shipped", None);
        item.fields.state = "Closed".into();
        let backlog = normalize(&[item]);
        assert_eq!(backlog.tasks[0].state, TaskState::Closed);
    }

    #[test]
    fn missing_assignee_and_estimate_stay_missing() {
        let item = RawWorkItem {
            id: 5,
            fields: RawFields {
                title: "[BE] bare".into(),
                item_type: "Task".into(),
                ..RawFields::default()
            },
        };
        let backlog = normalize(&[item]);
        let task = &backlog.tasks[0];
        assert_eq!(task.assignee, None);
        assert_eq!(task.estimate_hours, None);
    }

    #[test]
    fn unsupported_types_are_skipped() {
        let mut item = raw_story(1, "Epic of epics");
        item.fields.item_type = "Epic".into();
        let backlog = normalize(&[item]);
        assert!(backlog.tasks.is_empty());
        assert!(backlog.stories.is_empty());
    }

    #[test]
    fn orphan_parent_reference_is_kept_on_the_task() {
        let backlog = normalize(&[raw_task(2, "[BE] orphan", Some(999))]);
        assert_eq!(backlog.tasks[0].story_id, Some(999));
        assert!(backlog.stories.is_empty());
    }
}
