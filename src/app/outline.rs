//! Plain-text rendering of courses, positions and progress

use std::fmt::Write;

use crate::api::RemoteProgress;
use crate::course::{ContentItem, Course, ItemKey, Task};
use crate::progress::{self, ProgressSnapshot, TopicProgress};
use crate::sequence::Position;

/// Status indicators for tasks and items
const STATUS_NOT_STARTED: &str = "○";
const STATUS_IN_PROGRESS: &str = "●";
const STATUS_COMPLETED: &str = "✓";
const STATUS_UNGRADED: &str = "·";

const CURRENT_MARKER: &str = "▶";

fn task_status(task: &Task) -> &'static str {
    let snapshot = progress::summarize_task(task);
    if snapshot.is_finished() {
        STATUS_COMPLETED
    } else if snapshot.completed > 0 {
        STATUS_IN_PROGRESS
    } else {
        STATUS_NOT_STARTED
    }
}

fn item_status(item: &ContentItem) -> &'static str {
    if !item.kind().is_graded() {
        STATUS_UNGRADED
    } else if item.is_completed() {
        STATUS_COMPLETED
    } else {
        STATUS_NOT_STARTED
    }
}

fn display_title<'a>(title: &'a str, fallback: &'a str) -> &'a str {
    if title.trim().is_empty() { fallback } else { title }
}

/// One-line progress summary
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{}/{} graded items complete ({}%)",
        snapshot.completed, snapshot.total, snapshot.percentage
    )
}

/// Full course tree with statuses and the current item marked
pub fn render_outline(course: &Course, current: Option<&ItemKey>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", course.title);
    let _ = writeln!(out, "{}", progress_line(&progress::summarize(course)));

    for topic in &course.topics {
        let snapshot = progress::summarize_topic(topic);
        let _ = writeln!(
            out,
            "\n▼ {}  [{}%]",
            display_title(&topic.title, &topic.id),
            snapshot.percentage
        );

        for task in &topic.tasks {
            let title = display_title(&task.title, &task.id);
            let _ = writeln!(out, "   {} {}", task_status(task), title);

            for item in &task.items {
                let is_current =
                    current.is_some_and(|key| key.matches(&task.id, item.kind(), &item.id));
                let marker = if is_current { CURRENT_MARKER } else { " " };
                let status = item_status(item);
                let _ = write!(out, "    {marker} {status} {} {}", item.kind(), item.id);
                if !item.title.is_empty() {
                    let _ = write!(out, "  {}", item.title);
                }
                out.push('\n');
            }
        }
    }

    if !course.issues.is_empty() {
        let _ = writeln!(out, "\n{} item(s) could not be loaded:", course.issues.len());
        for issue in &course.issues {
            let _ = writeln!(out, "  - {issue}");
        }
    }

    out
}

/// Where the learner is, with the item's status
pub fn render_position(course: &Course, position: &Position, redirected: bool) -> String {
    let mut out = String::new();

    let topic = course.topics.iter().find(|t| t.id == position.topic_id);
    let task = course.task(&position.task_id);
    let item = task.and_then(|t| t.find_item(position.kind, &position.id));

    let _ = writeln!(
        out,
        "{} › {}",
        topic.map(|t| display_title(&t.title, &t.id)).unwrap_or(&position.topic_id),
        task.map(|t| display_title(&t.title, &t.id)).unwrap_or(&position.task_id),
    );
    match item {
        Some(item) => {
            let _ = writeln!(
                out,
                "{} {} {}  {}",
                item_status(item),
                item.kind(),
                item.id,
                display_title(&item.title, "")
            );
        }
        None => {
            let _ = writeln!(out, "{} {}", position.kind, position.id);
        }
    }
    if redirected {
        let _ = writeln!(out, "(requested item not found; showing the start of the task)");
    }

    out
}

/// Local progress per topic, plus the service's figure when available
pub fn render_progress(
    course: &Course,
    topics: &[TopicProgress],
    remote: Option<&RemoteProgress>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", course.title);
    let _ = writeln!(out, "Local:  {}", progress_line(&progress::summarize(course)));
    if let Some(remote) = remote {
        let _ = writeln!(
            out,
            "Server: {}/{} complete ({:.0}%)",
            remote.completed, remote.total, remote.percentage
        );
    }

    for topic in topics {
        let _ = writeln!(
            out,
            "  {:<30} {:>3}/{:<3} {:>3}%",
            display_title(&topic.title, &topic.topic_id),
            topic.snapshot.completed,
            topic.snapshot.total,
            topic.snapshot.percentage
        );
    }

    out
}
