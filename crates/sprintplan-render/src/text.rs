//! Plain text rendering of a sprint report.

use crate::{Renderer, SprintReport};
use sprintplan_core::RenderError;

/// Truncate long titles so columns stay readable
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Console/text-file renderer
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Title column width
    pub width: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { width: 40 }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the title column width
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, report: &SprintReport) -> Result<String, RenderError> {
        let mut out = String::new();
        let sprint = &report.sprint;

        out.push_str(&format!(
            "Sprint {} ({} Q{})  {} .. {}  [{}]\n",
            sprint.name, sprint.year, sprint.quarter, sprint.start, sprint.end, sprint.timezone
        ));
        out.push('\n');

        out.push_str("User stories\n");
        if report.stories.is_empty() {
            out.push_str("  (none placed)\n");
        }
        for story in &report.stories {
            out.push_str(&format!(
                "  {:<8} {:<w$}  {:>2} pts  {:<24} {} .. {}\n",
                story.story_id,
                truncate(&story.title, self.width),
                story.points,
                story.owner,
                story.start,
                story.end,
                w = self.width,
            ));
        }
        out.push('\n');

        out.push_str("Placements\n");
        for row in &report.placements {
            out.push_str(&format!(
                "  {:<8} {:<w$}  {:>5}h  {:<24} {} .. {}\n",
                row.task_id,
                truncate(&row.title, self.width),
                row.hours,
                row.executor,
                row.start,
                row.end,
                w = self.width,
            ));
        }
        out.push('\n');

        if !report.dayoffs.is_empty() {
            out.push_str("Day-offs\n");
            for summary in &report.dayoffs {
                let entries: Vec<String> = summary
                    .absences
                    .iter()
                    .map(|a| format!("{} {}", a.date, a.period))
                    .collect();
                out.push_str(&format!("  {}: {}\n", summary.email, entries.join(", ")));
            }
            out.push('\n');
        }

        if !report.dependencies.is_empty() {
            out.push_str("Dependencies\n");
            for edge in &report.dependencies {
                out.push_str(&format!("  {} <- {}\n", edge.successor, edge.prerequisite));
            }
            out.push('\n');
        }

        if !report.rejections.is_empty() {
            out.push_str("Rejections\n");
            for group in &report.rejections {
                out.push_str(&format!("  {}\n", group.reason));
                for task in &group.tasks {
                    out.push_str(&format!(
                        "    {:<8} {}\n",
                        task.task_id,
                        truncate(&task.title, self.width)
                    ));
                }
            }
        }

        Ok(out)
    }
}
