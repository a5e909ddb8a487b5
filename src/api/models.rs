//! Wire models for the curriculum service
//!
//! The backend is loose about types: ids arrive as strings or numbers and
//! `order` may be missing, null, numeric or a numeric string. Everything here
//! deserializes leniently and leaves validation to the normalizer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::course::model::{ContentItem, ContentKind, ContentPayload, ItemKey};

/// Course record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCourse {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Topic as listed for a course
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTopic {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: Option<i64>,
}

/// Task as listed for a topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawTask {
    /// Only active tasks are shown to learners
    pub fn is_active(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("active"))
    }
}

/// Per-task content listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskDetail {
    #[serde(default)]
    pub pages: Vec<RawContent>,
    #[serde(default)]
    pub videos: Vec<RawContent>,
    #[serde(default)]
    pub documents: Vec<RawContent>,
    #[serde(default)]
    pub coding_questions: Vec<RawContent>,
}

/// A page, video, document or coding question
///
/// Fields the engine does not interpret are kept in `extra` and handed to the
/// renderer untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawContent {
    /// Create a content record with an id and order
    pub fn new(id: impl Into<String>, order: Option<i64>) -> Self {
        Self { id: Some(id.into()), order, ..Default::default() }
    }

    /// Set the completion flag
    pub fn completed(mut self, done: bool) -> Self {
        self.is_completed = Some(done);
        self
    }
}

/// A quiz set attached to a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizSet {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: Option<i64>,
    #[serde(default)]
    pub questions: Vec<RawQuizQuestion>,
}

/// Question reference inside a quiz set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizQuestion {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

/// Body of a mark-complete call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub course_id: String,
    pub task_id: String,
    pub content_type: ContentKind,
    /// Backend id of the content; the quiz-set id for quiz groups when known
    pub content_id: String,
    /// Nested question ids, for quiz groups
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub question_ids: Vec<String>,
}

impl CompletionRequest {
    /// Build the request for an item of the given course
    pub fn for_item(course_id: &str, key: &ItemKey, item: &ContentItem) -> Self {
        let (content_id, question_ids) = match &item.payload {
            ContentPayload::McqGroup(group) => (
                group.set_id.clone().unwrap_or_else(|| key.id.clone()),
                group.questions.iter().map(|q| q.id.clone()).collect(),
            ),
            _ => (key.id.clone(), Vec::new()),
        };

        Self {
            course_id: course_id.to_string(),
            task_id: key.task_id.clone(),
            content_type: key.kind,
            content_id,
            question_ids,
        }
    }
}

/// Aggregate progress as computed by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProgress {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub percentage: f64,
}

/// Accept a string or number id; empty strings count as missing
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept an integer, a float or a numeric string; anything else is missing
fn lenient_order<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
