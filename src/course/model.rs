//! Canonical curriculum tree
//!
//! A course is a strict tree: topics own tasks, tasks own content items.
//! Trees are immutable snapshots once built; completion updates produce a
//! new tree rather than editing one that readers may still hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the client-side id given to aggregated quiz groups
pub const MCQ_GROUP_PREFIX: &str = "mcq_group_";

/// Order assigned to graded content that arrives without a usable `order`
pub const TRAILING_ORDER: i64 = i64::MAX;

/// The closed set of content variants a task can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Rich-text page (informational, never graded)
    Page,
    /// Video lesson
    Video,
    /// Downloadable or embedded document
    Document,
    /// Aggregated multiple-choice quiz set
    McqGroup,
    /// Coding exercise
    CodingQuestion,
}

impl ContentKind {
    /// Wire name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Video => "video",
            Self::Document => "document",
            Self::McqGroup => "mcq_group",
            Self::CodingQuestion => "coding_question",
        }
    }

    /// Whether items of this kind count towards progress
    pub fn is_graded(&self) -> bool {
        !matches!(self, Self::Page)
    }

    /// Order used when the backend omits or garbles an item's `order`
    pub fn default_order(&self) -> i64 {
        match self {
            Self::Page | Self::Video | Self::Document => 0,
            Self::McqGroup | Self::CodingQuestion => TRAILING_ORDER,
        }
    }

    /// Parse a kind from its wire name or a short alias
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "page" => Some(Self::Page),
            "video" => Some(Self::Video),
            "document" | "doc" => Some(Self::Document),
            "mcq_group" | "mcq" | "quiz" => Some(Self::McqGroup),
            "coding_question" | "coding" | "code" => Some(Self::CodingQuestion),
            _ => None,
        }
    }

    /// All variants, in assembly order
    pub fn all() -> &'static [ContentKind] {
        &[Self::Page, Self::Video, Self::Document, Self::McqGroup, Self::CodingQuestion]
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "Unknown content type: {s}. \
                 Options: page, video, document, mcq_group, coding_question"
            )
        })
    }
}

/// Addressable id of a task's quiz group when the task has a single quiz set
pub fn mcq_group_id(task_id: &str) -> String {
    format!("{MCQ_GROUP_PREFIX}{task_id}")
}

/// Addressable id of one quiz group among several on the same task
pub fn mcq_group_id_for_set(task_id: &str, set: &str) -> String {
    format!("{MCQ_GROUP_PREFIX}{task_id}_{set}")
}

/// Identity of a content item
///
/// An item id is only unique together with its kind and owning task, so all
/// three take part in every comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub task_id: String,
    pub kind: ContentKind,
    pub id: String,
}

impl ItemKey {
    pub fn new(task_id: impl Into<String>, kind: ContentKind, id: impl Into<String>) -> Self {
        Self { task_id: task_id.into(), kind, id: id.into() }
    }

    /// Compare against a loose (task, kind, id) triple
    pub fn matches(&self, task_id: &str, kind: ContentKind, id: &str) -> bool {
        self.kind == kind && self.task_id == task_id && self.id == id
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.task_id, self.kind, self.id)
    }
}

/// A node the normalizer had to leave out of the tree, or could only partly build
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LoadIssue {
    #[error("topic at position {position} has no id")]
    TopicMissingId { position: usize },

    #[error("task at position {position} of topic {topic_id} has no id")]
    TaskMissingId { topic_id: String, position: usize },

    #[error("task {task_id} is also listed under topic {topic_id}")]
    DuplicateTask { task_id: String, topic_id: String },

    #[error("task list for topic {topic_id} failed: {message}")]
    TaskListFailed { topic_id: String, message: String },

    #[error("detail for task {task_id} failed: {message}")]
    DetailFailed { task_id: String, message: String },

    #[error("quiz sets for task {task_id} failed: {message}")]
    QuizSetsFailed { task_id: String, message: String },

    #[error("{kind} item in task {task_id} has no id")]
    ItemMissingId { task_id: String, kind: ContentKind },

    #[error("duplicate {kind} item {id} in task {task_id}")]
    DuplicateItem { task_id: String, kind: ContentKind, id: String },
}

/// A fully assembled course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Optional description from the course record
    pub description: Option<String>,
    /// Topics in display order
    pub topics: Vec<Topic>,
    /// Nodes skipped or partly built during normalization
    #[serde(default)]
    pub issues: Vec<LoadIssue>,
}

impl Course {
    /// Create an empty course
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            topics: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Iterate over every task together with its owning topic
    pub fn tasks(&self) -> impl Iterator<Item = (&Topic, &Task)> {
        self.topics.iter().flat_map(|topic| topic.tasks.iter().map(move |task| (topic, task)))
    }

    /// Find a task by id
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks().find(|(_, task)| task.id == task_id).map(|(_, task)| task)
    }

    /// Find the topic that owns a task
    pub fn topic_of(&self, task_id: &str) -> Option<&Topic> {
        self.tasks().find(|(_, task)| task.id == task_id).map(|(topic, _)| topic)
    }

    /// Find an item by exact identity
    pub fn find_item(&self, task_id: &str, kind: ContentKind, id: &str) -> Option<&ContentItem> {
        self.task(task_id).and_then(|task| task.find_item(kind, id))
    }

    /// Total number of content items in the tree
    pub fn item_count(&self) -> usize {
        self.tasks().map(|(_, task)| task.items.len()).sum()
    }

    /// Mutable access to a task, used when deriving an updated snapshot
    pub(crate) fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.topics
            .iter_mut()
            .flat_map(|topic| topic.tasks.iter_mut())
            .find(|task| task.id == task_id)
    }
}

/// A topic within a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Authoritative position among sibling topics
    pub order: i64,
    /// Active tasks in fetch order
    pub tasks: Vec<Task>,
}

/// An active task within a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Content items sorted by `order`, ties in assembly order
    pub items: Vec<ContentItem>,
}

impl Task {
    /// First item in display order
    pub fn first_item(&self) -> Option<&ContentItem> {
        self.items.first()
    }

    /// Find an item by kind and id
    pub fn find_item(&self, kind: ContentKind, id: &str) -> Option<&ContentItem> {
        self.items.iter().find(|item| item.kind() == kind && item.id == id)
    }

    /// Resolve a quiz group addressed by something other than its own id
    ///
    /// Accepts the backing quiz-set id, or the single-set synthetic id for a
    /// task that now exposes several sets.
    pub fn resolve_quiz_alias(&self, id: &str) -> Option<&ContentItem> {
        let legacy = mcq_group_id(&self.id);
        let multi_prefix = format!("{legacy}_");
        self.items.iter().find(|item| match &item.payload {
            ContentPayload::McqGroup(group) => {
                group.set_id.as_deref() == Some(id)
                    || (id == legacy && item.id.starts_with(&multi_prefix))
            }
            _ => false,
        })
    }

    /// Key of an item owned by this task
    pub fn key_of(&self, item: &ContentItem) -> ItemKey {
        ItemKey::new(self.id.clone(), item.kind(), item.id.clone())
    }
}

/// One addressable unit of learning material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Addressable id, unique within the task for this kind
    pub id: String,
    /// Position within the task
    pub order: i64,
    /// Display title
    pub title: String,
    /// Completion flag for non-aggregated kinds
    completed: bool,
    /// Variant-specific data
    pub payload: ContentPayload,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, order: i64, payload: ContentPayload) -> Self {
        Self { id: id.into(), order, title: String::new(), completed: false, payload }
    }

    /// Set the display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial completion flag
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Content variant of this item
    pub fn kind(&self) -> ContentKind {
        match &self.payload {
            ContentPayload::Page(_) => ContentKind::Page,
            ContentPayload::Video(_) => ContentKind::Video,
            ContentPayload::Document(_) => ContentKind::Document,
            ContentPayload::McqGroup(_) => ContentKind::McqGroup,
            ContentPayload::CodingQuestion(_) => ContentKind::CodingQuestion,
        }
    }

    /// Whether the learner has completed this item
    ///
    /// A quiz group is complete only when every nested question is.
    pub fn is_completed(&self) -> bool {
        match &self.payload {
            ContentPayload::McqGroup(group) => group.is_completed(),
            _ => self.completed,
        }
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
        if let ContentPayload::McqGroup(group) = &mut self.payload {
            for question in &mut group.questions {
                question.completed = true;
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.completed = false;
        if let ContentPayload::McqGroup(group) = &mut self.payload {
            for question in &mut group.questions {
                question.completed = false;
            }
        }
    }
}

/// Variant payloads; rendering data is carried opaquely
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ContentPayload {
    Page(serde_json::Value),
    Video(serde_json::Value),
    Document(serde_json::Value),
    McqGroup(QuizGroup),
    CodingQuestion(serde_json::Value),
}

/// Questions aggregated under one quiz group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizGroup {
    /// Backing quiz-set id, when the backend supplies one
    pub set_id: Option<String>,
    pub questions: Vec<QuizQuestion>,
}

impl QuizGroup {
    pub fn is_completed(&self) -> bool {
        self.questions.iter().all(|q| q.completed)
    }
}

/// A single question inside a quiz group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub completed: bool,
}

impl QuizQuestion {
    pub fn new(id: impl Into<String>, completed: bool) -> Self {
        Self { id: id.into(), completed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz(set_id: Option<&str>, done: &[bool]) -> ContentPayload {
        ContentPayload::McqGroup(QuizGroup {
            set_id: set_id.map(str::to_string),
            questions: done
                .iter()
                .enumerate()
                .map(|(i, d)| QuizQuestion::new(format!("q{i}"), *d))
                .collect(),
        })
    }

    #[test]
    fn kind_parse() {
        assert_eq!(ContentKind::parse("page"), Some(ContentKind::Page));
        assert_eq!(ContentKind::parse("QUIZ"), Some(ContentKind::McqGroup));
        assert_eq!(ContentKind::parse("coding_question"), Some(ContentKind::CodingQuestion));
        assert_eq!(ContentKind::parse("doc"), Some(ContentKind::Document));
        assert_eq!(ContentKind::parse("slides"), None);
        assert!("slides".parse::<ContentKind>().is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ContentKind::CodingQuestion).unwrap();
        assert_eq!(json, "\"coding_question\"");
    }

    #[test]
    fn pages_are_not_graded() {
        assert!(!ContentKind::Page.is_graded());
        assert!(ContentKind::all().iter().filter(|k| k.is_graded()).count() == 4);
    }

    #[test]
    fn graded_content_trails_by_default() {
        assert_eq!(ContentKind::Video.default_order(), 0);
        assert_eq!(ContentKind::McqGroup.default_order(), TRAILING_ORDER);
        assert_eq!(ContentKind::CodingQuestion.default_order(), TRAILING_ORDER);
    }

    #[test]
    fn synthetic_group_ids() {
        assert_eq!(mcq_group_id("42"), "mcq_group_42");
        assert_eq!(mcq_group_id_for_set("42", "7"), "mcq_group_42_7");
    }

    #[test]
    fn item_key_requires_kind_match() {
        let key = ItemKey::new("t1", ContentKind::Page, "1");
        assert!(key.matches("t1", ContentKind::Page, "1"));
        assert!(!key.matches("t1", ContentKind::Video, "1"));
        assert!(!key.matches("t2", ContentKind::Page, "1"));
        assert_eq!(key.to_string(), "t1/page/1");
    }

    #[test]
    fn quiz_group_completion_is_aggregated() {
        let mut item = ContentItem::new("mcq_group_t1", 0, quiz(None, &[true, false]));
        assert!(!item.is_completed());

        item.mark_completed();
        assert!(item.is_completed());

        if let ContentPayload::McqGroup(group) = &mut item.payload {
            group.questions[1].completed = false;
        }
        assert!(!item.is_completed());
    }

    #[test]
    fn reset_clears_nested_questions() {
        let mut item = ContentItem::new("mcq_group_t1", 0, quiz(None, &[true, true]));
        assert!(item.is_completed());
        item.reset();
        assert!(!item.is_completed());
    }

    #[test]
    fn quiz_alias_resolves_set_id_and_legacy_id() {
        let task = Task {
            id: "t1".into(),
            title: "Task".into(),
            items: vec![
                ContentItem::new("p1", 0, ContentPayload::Page(json!({}))),
                ContentItem::new(mcq_group_id_for_set("t1", "s9"), 1, quiz(Some("s9"), &[false])),
            ],
        };

        assert_eq!(task.resolve_quiz_alias("s9").map(|i| i.id.as_str()), Some("mcq_group_t1_s9"));
        assert_eq!(
            task.resolve_quiz_alias("mcq_group_t1").map(|i| i.id.as_str()),
            Some("mcq_group_t1_s9")
        );
        assert!(task.resolve_quiz_alias("p1").is_none());
    }

    #[test]
    fn course_lookup() {
        let mut course = Course::new("c1", "Course");
        course.topics.push(Topic {
            id: "a".into(),
            title: "A".into(),
            description: None,
            order: 1,
            tasks: vec![Task {
                id: "t1".into(),
                title: "Task".into(),
                items: vec![ContentItem::new("v1", 0, ContentPayload::Video(json!({})))],
            }],
        });

        assert_eq!(course.topic_of("t1").map(|t| t.id.as_str()), Some("a"));
        assert!(course.find_item("t1", ContentKind::Video, "v1").is_some());
        assert!(course.find_item("t1", ContentKind::Page, "v1").is_none());
        assert_eq!(course.item_count(), 1);
    }
}
