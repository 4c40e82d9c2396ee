//! User-story rollup over the placed tasks.
//!
//! A story with no placed children is omitted entirely; its rejections stay
//! in the schedule's rejection list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sprintplan_core::{Email, Slot, StoryId, Task, UserStory};

use crate::SprintSchedule;

/// Aggregated view of one user story after scheduling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorySummary {
    pub story_id: StoryId,
    pub title: String,
    /// Executor carrying the most placed hours (ties: lexicographic email)
    pub owner: Email,
    /// Earliest start slot among placed children
    pub start: Slot,
    /// Latest end slot among placed children
    pub end: Slot,
    /// Bucketed story points derived from the placed hours
    pub points: u32,
    /// Sum of placed-task hours under this story
    pub placed_hours: f64,
}

/// Map summed task hours to story points.
///
/// The buckets are fixed: 0-4h -> 1, 4-8h -> 2, 8-16h -> 3, 16-24h -> 5,
/// 24-40h -> 8, above 40h -> 13.
pub fn story_points(hours: f64) -> u32 {
    if hours <= 4.0 {
        1
    } else if hours <= 8.0 {
        2
    } else if hours <= 16.0 {
        3
    } else if hours <= 24.0 {
        5
    } else if hours <= 40.0 {
        8
    } else {
        13
    }
}

/// Aggregate each user story from its placed children, ascending story id
pub fn aggregate_stories(
    stories: &[UserStory],
    tasks: &[Task],
    schedule: &SprintSchedule,
) -> Vec<StorySummary> {
    let mut sorted: Vec<&UserStory> = stories.iter().collect();
    sorted.sort_by_key(|s| s.id);

    let mut summaries = Vec::new();
    for story in sorted {
        let placed: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.story_id == Some(story.id))
            .filter(|t| schedule.placements.contains_key(&t.id))
            .collect();
        if placed.is_empty() {
            continue;
        }

        let mut hours_by_executor: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total_hours = 0.0;
        let first = &schedule.placements[&placed[0].id];
        let mut start = first.start;
        let mut end = first.end;

        for task in &placed {
            let placement = &schedule.placements[&task.id];
            let hours = task.estimate_hours.unwrap_or(0.0);
            *hours_by_executor.entry(placement.executor.as_str()).or_default() += hours;
            total_hours += hours;
            start = start.min(placement.start);
            end = end.max(placement.end);
        }

        // BTreeMap iterates emails in lexicographic order, so a strict
        // comparison hands ties to the smallest email.
        let mut owner = "";
        let mut owner_hours = f64::NEG_INFINITY;
        for (email, hours) in &hours_by_executor {
            if *hours > owner_hours {
                owner = email;
                owner_hours = *hours;
            }
        }

        summaries.push(StorySummary {
            story_id: story.id,
            title: story.title.clone(),
            owner: owner.to_string(),
            start,
            end,
            points: story_points(total_hours),
            placed_hours: total_hours,
        });
    }

    summaries
}
