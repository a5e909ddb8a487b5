//! Progress aggregation
//!
//! Completion counts are derived from a tree snapshot, never stored. Pages
//! are informational and left out of both sides of the ratio.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::course::model::{ContentItem, Course, ItemKey, Task, Topic};

/// Completion summary over some part of a course
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Graded items completed
    pub completed: usize,
    /// Graded items in total
    pub total: usize,
    /// Rounded percentage, 0 when there is nothing to grade
    pub percentage: u8,
}

impl ProgressSnapshot {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 * 100.0) / total as f64).round().clamp(0.0, 100.0) as u8
        };
        Self { completed, total, percentage }
    }

    /// Whether every graded item is complete (false when nothing is graded)
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    fn tally<'a>(items: impl Iterator<Item = &'a ContentItem>) -> Self {
        let (completed, total) = items
            .filter(|item| item.kind().is_graded())
            .fold((0, 0), |(done, total), item| {
                (done + usize::from(item.is_completed()), total + 1)
            });
        Self::new(completed, total)
    }
}

/// Progress for one topic, for sidebar display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic_id: String,
    pub title: String,
    pub snapshot: ProgressSnapshot,
}

/// Summarize the whole course
pub fn summarize(course: &Course) -> ProgressSnapshot {
    ProgressSnapshot::tally(course.tasks().flat_map(|(_, task)| task.items.iter()))
}

/// Summarize one task
pub fn summarize_task(task: &Task) -> ProgressSnapshot {
    ProgressSnapshot::tally(task.items.iter())
}

/// Summarize one topic
pub fn summarize_topic(topic: &Topic) -> ProgressSnapshot {
    ProgressSnapshot::tally(topic.tasks.iter().flat_map(|task| task.items.iter()))
}

/// Summarize each topic, in display order
pub fn summarize_topics(course: &Course) -> Vec<TopicProgress> {
    course
        .topics
        .iter()
        .map(|topic| TopicProgress {
            topic_id: topic.id.clone(),
            title: topic.title.clone(),
            snapshot: summarize_topic(topic),
        })
        .collect()
}

/// A new tree with one item marked complete
///
/// A quiz group also has every nested question marked. An unknown key yields
/// an unchanged copy.
pub fn apply_completion(course: &Course, key: &ItemKey) -> Course {
    let mut updated = course.clone();

    let item = updated
        .task_mut(&key.task_id)
        .and_then(|task| {
            task.items.iter_mut().find(|item| item.kind() == key.kind && item.id == key.id)
        });

    match item {
        Some(item) => item.mark_completed(),
        None => debug!(item = %key, "Completion target not in tree"),
    }

    updated
}

/// A new tree with every item of a task marked incomplete
pub fn apply_reset(course: &Course, task_id: &str) -> Course {
    let mut updated = course.clone();

    match updated.task_mut(task_id) {
        Some(task) => task.items.iter_mut().for_each(ContentItem::reset),
        None => debug!(task = task_id, "Reset target not in tree"),
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::model::{ContentKind, ContentPayload, QuizGroup, QuizQuestion};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn page(id: &str) -> ContentItem {
        ContentItem::new(id, 0, ContentPayload::Page(json!({})))
    }

    fn video(id: &str, done: bool) -> ContentItem {
        ContentItem::new(id, 1, ContentPayload::Video(json!({}))).with_completed(done)
    }

    fn quiz(id: &str, done: &[bool]) -> ContentItem {
        let questions =
            done.iter().enumerate().map(|(i, d)| QuizQuestion::new(format!("q{i}"), *d)).collect();
        ContentItem::new(id, 2, ContentPayload::McqGroup(QuizGroup { set_id: None, questions }))
    }

    fn course(tasks: Vec<(&str, &str, Vec<ContentItem>)>) -> Course {
        let mut course = Course::new("c1", "Course");
        for (topic_id, task_id, items) in tasks {
            let task = Task { id: task_id.into(), title: String::new(), items };
            match course.topics.iter_mut().find(|t| t.id == topic_id) {
                Some(topic) => topic.tasks.push(task),
                None => course.topics.push(Topic {
                    id: topic_id.into(),
                    title: format!("Topic {topic_id}"),
                    description: None,
                    order: course.topics.len() as i64,
                    tasks: vec![task],
                }),
            }
        }
        course
    }

    #[test]
    fn pages_only_course_is_zero_percent() {
        let snapshot = summarize(&course(vec![("A", "1", vec![page("p1"), page("p2")])]));
        assert_eq!(snapshot, ProgressSnapshot { completed: 0, total: 0, percentage: 0 });
        assert!(!snapshot.is_finished());
    }

    #[test]
    fn percentage_rounds() {
        assert_eq!(ProgressSnapshot::new(1, 3).percentage, 33);
        assert_eq!(ProgressSnapshot::new(2, 3).percentage, 67);
        assert_eq!(ProgressSnapshot::new(1, 2).percentage, 50);
        assert_eq!(ProgressSnapshot::new(3, 3).percentage, 100);
    }

    #[test]
    fn quiz_group_counts_once_and_only_when_all_answered() {
        let items = vec![page("p1"), video("v1", true), quiz("mcq_group_1", &[true, false])];
        let tree = course(vec![("A", "1", items)]);
        assert_eq!(summarize(&tree), ProgressSnapshot::new(1, 2));

        let group = ItemKey::new("1", ContentKind::McqGroup, "mcq_group_1");
        let done = apply_completion(&tree, &group);
        assert_eq!(summarize(&done), ProgressSnapshot::new(2, 2));
        assert!(summarize(&done).is_finished());
    }

    #[test]
    fn completion_leaves_original_untouched() {
        let tree = course(vec![("A", "1", vec![video("v1", false)])]);
        let key = ItemKey::new("1", ContentKind::Video, "v1");

        let updated = apply_completion(&tree, &key);
        assert_eq!(summarize(&tree).completed, 0);
        assert_eq!(summarize(&updated).completed, 1);

        let again = apply_completion(&updated, &key);
        assert_eq!(summarize(&again), summarize(&updated));
    }

    #[test]
    fn completion_matches_kind_as_well_as_id() {
        let tree = course(vec![("A", "1", vec![video("7", false)])]);
        let updated = apply_completion(&tree, &ItemKey::new("1", ContentKind::CodingQuestion, "7"));
        assert_eq!(summarize(&updated).completed, 0);
    }

    #[test]
    fn reset_clears_only_the_task() {
        let tree = course(vec![
            ("A", "1", vec![video("v1", true), quiz("mcq_group_1", &[true, true])]),
            ("A", "2", vec![video("v2", true)]),
        ]);
        assert_eq!(summarize(&tree).completed, 3);

        let reset = apply_reset(&tree, "1");
        assert_eq!(summarize(&reset), ProgressSnapshot::new(1, 3));
        assert_eq!(summarize_task(reset.task("1").unwrap()), ProgressSnapshot::new(0, 2));
    }

    #[test]
    fn topics_are_summarized_separately() {
        let tree = course(vec![
            ("A", "1", vec![video("v1", true)]),
            ("B", "2", vec![video("v2", false), page("p1")]),
        ]);

        let topics = summarize_topics(&tree);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].snapshot, ProgressSnapshot::new(1, 1));
        assert_eq!(topics[1].topic_id, "B");
        assert_eq!(topics[1].snapshot, ProgressSnapshot::new(0, 1));
    }
}
