//! Content normalizer
//!
//! Turns the raw, possibly partial, results of a course fetch into a
//! canonical [`Course`]. Malformed or failed nodes are skipped and recorded as
//! [`LoadIssue`]s; nothing here fails the whole tree.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use super::model::{
    ContentItem, ContentKind, ContentPayload, Course, LoadIssue, QuizGroup, QuizQuestion,
    TRAILING_ORDER, Task, Topic, mcq_group_id, mcq_group_id_for_set,
};
use crate::api::models::{RawContent, RawCourse, RawQuizSet, RawTask, RawTaskDetail, RawTopic};

/// Everything fetched for one course, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawCourseBundle {
    pub course_id: String,
    /// Course record, if that call succeeded
    pub course: Option<RawCourse>,
    /// Topics in fetch order
    pub topics: Vec<RawTopicBundle>,
}

/// A topic and the outcome of listing its tasks
#[derive(Debug, Clone)]
pub struct RawTopicBundle {
    pub topic: RawTopic,
    /// Task list, or the failure message
    pub tasks: Result<Vec<RawTaskBundle>, String>,
}

/// A task and the outcome of its detail and quiz-set calls
#[derive(Debug, Clone)]
pub struct RawTaskBundle {
    pub task: RawTask,
    pub detail: Result<RawTaskDetail, String>,
    pub quiz_sets: Result<Vec<RawQuizSet>, String>,
}

impl RawTaskBundle {
    /// A task whose detail and quiz calls both succeeded
    pub fn fetched(task: RawTask, detail: RawTaskDetail, quiz_sets: Vec<RawQuizSet>) -> Self {
        Self { task, detail: Ok(detail), quiz_sets: Ok(quiz_sets) }
    }

    /// A task that was listed but never fetched (inactive or missing an id)
    pub fn unfetched(task: RawTask) -> Self {
        Self { task, detail: Ok(RawTaskDetail::default()), quiz_sets: Ok(Vec::new()) }
    }
}

/// Build the canonical tree for a course
pub fn normalize(bundle: RawCourseBundle) -> Course {
    let RawCourseBundle { course_id, course, topics: raw_topics } = bundle;
    let mut issues = Vec::new();

    let (title, description) = match course {
        Some(record) => (record.title.unwrap_or_else(|| course_id.clone()), record.description),
        None => (course_id.clone(), None),
    };

    // Stable: equal orders keep fetch order. Sorting first means a task listed
    // under two topics stays with the one displayed first.
    let mut raw_topics: Vec<(usize, RawTopicBundle)> = raw_topics.into_iter().enumerate().collect();
    raw_topics.sort_by_key(|(_, raw)| raw.topic.order.unwrap_or(TRAILING_ORDER));

    let mut seen_tasks = HashSet::new();
    let topics: Vec<Topic> = raw_topics
        .into_iter()
        .filter_map(|(position, raw)| normalize_topic(raw, position, &mut seen_tasks, &mut issues))
        .collect();

    debug!(
        course = %course_id,
        topics = topics.len(),
        issues = issues.len(),
        "Normalized course"
    );

    Course { id: course_id, title, description, topics, issues }
}

fn normalize_topic(
    raw: RawTopicBundle,
    position: usize,
    seen_tasks: &mut HashSet<String>,
    issues: &mut Vec<LoadIssue>,
) -> Option<Topic> {
    let RawTopicBundle { topic, tasks } = raw;

    let Some(topic_id) = topic.id else {
        warn!(position, "Skipping topic without id");
        issues.push(LoadIssue::TopicMissingId { position });
        return None;
    };

    let raw_tasks = match tasks {
        Ok(tasks) => tasks,
        Err(message) => {
            warn!(topic = %topic_id, error = %message, "Skipping topic whose task list failed");
            issues.push(LoadIssue::TaskListFailed { topic_id, message });
            return None;
        }
    };

    let tasks: Vec<Task> = raw_tasks
        .into_iter()
        .enumerate()
        .filter_map(|(position, raw)| normalize_task(&topic_id, raw, position, seen_tasks, issues))
        .collect();

    if tasks.is_empty() {
        debug!(topic = %topic_id, "Dropping topic without usable tasks");
        return None;
    }

    Some(Topic {
        title: topic.title.unwrap_or_default(),
        description: topic.description,
        order: topic.order.unwrap_or(TRAILING_ORDER),
        id: topic_id,
        tasks,
    })
}

fn normalize_task(
    topic_id: &str,
    raw: RawTaskBundle,
    position: usize,
    seen_tasks: &mut HashSet<String>,
    issues: &mut Vec<LoadIssue>,
) -> Option<Task> {
    let RawTaskBundle { task, detail, quiz_sets } = raw;

    let Some(task_id) = task.id.clone() else {
        warn!(topic = topic_id, position, "Skipping task without id");
        issues.push(LoadIssue::TaskMissingId { topic_id: topic_id.to_string(), position });
        return None;
    };

    if !task.is_active() {
        debug!(task = %task_id, status = ?task.status, "Skipping inactive task");
        return None;
    }

    if !seen_tasks.insert(task_id.clone()) {
        warn!(task = %task_id, topic = topic_id, "Dropping task listed under a second topic");
        issues.push(LoadIssue::DuplicateTask { task_id, topic_id: topic_id.to_string() });
        return None;
    }

    let fetch_failed = detail.is_err() || quiz_sets.is_err();
    let mut assembled = Vec::new();

    let coding_questions = match detail {
        Ok(detail) => {
            let RawTaskDetail { pages, videos, documents, coding_questions } = detail;
            let listings: [(ContentKind, PayloadFn, Vec<RawContent>); 3] = [
                (ContentKind::Page, ContentPayload::Page, pages),
                (ContentKind::Video, ContentPayload::Video, videos),
                (ContentKind::Document, ContentPayload::Document, documents),
            ];
            for (kind, wrap, list) in listings {
                assembled.extend(
                    list.into_iter().filter_map(|c| content_item(&task_id, kind, wrap, c, issues)),
                );
            }
            coding_questions
        }
        Err(message) => {
            warn!(task = %task_id, error = %message, "Task detail failed; keeping quiz content");
            issues.push(LoadIssue::DetailFailed { task_id: task_id.clone(), message });
            Vec::new()
        }
    };

    match quiz_sets {
        Ok(sets) => assembled.extend(quiz_groups(&task_id, sets)),
        Err(message) => {
            warn!(task = %task_id, error = %message, "Quiz set listing failed");
            issues.push(LoadIssue::QuizSetsFailed { task_id: task_id.clone(), message });
        }
    }

    assembled.extend(coding_questions.into_iter().filter_map(|c| {
        let wrap = ContentPayload::CodingQuestion;
        content_item(&task_id, ContentKind::CodingQuestion, wrap, c, issues)
    }));

    let mut seen = HashSet::new();
    let mut items: Vec<ContentItem> = assembled
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert((item.kind(), item.id.clone()));
            if !fresh {
                warn!(
                    task = %task_id,
                    kind = %item.kind(),
                    id = %item.id,
                    "Dropping duplicate item"
                );
                issues.push(LoadIssue::DuplicateItem {
                    task_id: task_id.clone(),
                    kind: item.kind(),
                    id: item.id.clone(),
                });
            }
            fresh
        })
        .collect();

    if fetch_failed && items.is_empty() {
        warn!(task = %task_id, "Dropping task with no content left after failed fetches");
        return None;
    }

    // Stable: equal orders keep assembly order
    items.sort_by_key(|item| item.order);

    Some(Task { title: task.title.unwrap_or_default(), id: task_id, items })
}

/// Wraps opaque rendering data into a payload variant
type PayloadFn = fn(Value) -> ContentPayload;

fn content_item(
    task_id: &str,
    kind: ContentKind,
    wrap: PayloadFn,
    raw: RawContent,
    issues: &mut Vec<LoadIssue>,
) -> Option<ContentItem> {
    let RawContent { id, title, order, is_completed, extra } = raw;

    let Some(id) = id else {
        warn!(task = task_id, %kind, "Skipping content item without id");
        issues.push(LoadIssue::ItemMissingId { task_id: task_id.to_string(), kind });
        return None;
    };

    Some(
        ContentItem::new(id, order.unwrap_or(kind.default_order()), wrap(Value::Object(extra)))
            .with_title(title.unwrap_or_default())
            .with_completed(is_completed.unwrap_or(false)),
    )
}

/// One quiz group per quiz set
///
/// A single set keeps the `mcq_group_<task>` id existing links use; several
/// sets are told apart by their set id, or their position when it is missing.
fn quiz_groups(task_id: &str, sets: Vec<RawQuizSet>) -> Vec<ContentItem> {
    let single = sets.len() == 1;

    sets.into_iter()
        .enumerate()
        .map(|(index, set)| {
            let id = if single {
                mcq_group_id(task_id)
            } else {
                let discriminator = set.id.clone().unwrap_or_else(|| index.to_string());
                mcq_group_id_for_set(task_id, &discriminator)
            };

            let questions: Vec<QuizQuestion> = set
                .questions
                .into_iter()
                .filter_map(|q| {
                    let completed = q.is_completed.unwrap_or(false);
                    q.id.map(|id| QuizQuestion::new(id, completed))
                })
                .collect();

            let group = QuizGroup { set_id: set.id, questions };
            let completed = group.is_completed();

            let order = set.order.unwrap_or(ContentKind::McqGroup.default_order());
            ContentItem::new(id, order, ContentPayload::McqGroup(group))
                .with_title(set.title.unwrap_or_default())
                .with_completed(completed)
        })
        .collect()
}
