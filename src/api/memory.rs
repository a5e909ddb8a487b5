//! In-memory curriculum service for tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::CurriculumService;
use super::error::ApiError;
use super::models::{
    CompletionRequest, RawContent, RawCourse, RawQuizQuestion, RawQuizSet, RawTask, RawTaskDetail,
    RawTopic, RemoteProgress,
};

fn unavailable() -> ApiError {
    ApiError::Status { status: 503, message: "unavailable".into() }
}

/// Scriptable service; counts calls and fails on demand
#[derive(Default)]
pub struct InMemoryService {
    pub course: RawCourse,
    pub topics: Vec<RawTopic>,
    pub tasks: HashMap<String, Vec<RawTask>>,
    pub details: HashMap<String, RawTaskDetail>,
    pub quiz_sets: HashMap<String, Vec<RawQuizSet>>,
    /// Delay applied to the topic listing, to widen race windows
    pub topic_delay: Option<Duration>,

    pub fail_topics: AtomicBool,
    pub fail_completion: AtomicBool,
    pub fail_reset: AtomicBool,
    pub failing_task_lists: Mutex<Vec<String>>,
    pub failing_details: Mutex<Vec<String>>,

    pub topic_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub completions: Mutex<Vec<CompletionRequest>>,
    pub resets: Mutex<Vec<String>>,
}

impl InMemoryService {
    pub fn new(course_id: &str) -> Self {
        Self {
            course: RawCourse {
                id: Some(course_id.into()),
                title: Some(format!("Course {course_id}")),
                description: None,
            },
            ..Default::default()
        }
    }

    pub fn topic(mut self, id: &str, order: i64) -> Self {
        self.topics.push(RawTopic {
            id: Some(id.into()),
            title: Some(format!("Topic {id}")),
            description: None,
            order: Some(order),
        });
        self
    }

    pub fn task(mut self, topic_id: &str, task_id: &str, detail: RawTaskDetail) -> Self {
        self.tasks.entry(topic_id.into()).or_default().push(RawTask {
            id: Some(task_id.into()),
            title: Some(format!("Task {task_id}")),
            status: Some("active".into()),
        });
        self.details.insert(task_id.into(), detail);
        self
    }

    pub fn quiz_set(mut self, task_id: &str, set_id: &str, questions: &[(&str, bool)]) -> Self {
        self.quiz_sets.entry(task_id.into()).or_default().push(RawQuizSet {
            id: Some(set_id.into()),
            title: None,
            order: None,
            questions: questions
                .iter()
                .map(|(id, done)| RawQuizQuestion {
                    id: Some((*id).into()),
                    is_completed: Some(*done),
                })
                .collect(),
        });
        self
    }

    pub fn set_fail_topics(&self, fail: bool) {
        self.fail_topics.store(fail, Ordering::SeqCst);
    }

    pub fn topic_calls(&self) -> usize {
        self.topic_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> Vec<CompletionRequest> {
        self.completions.lock().unwrap().clone()
    }
}

/// Detail with the given pages, videos and coding questions
pub fn detail(
    pages: Vec<RawContent>,
    videos: Vec<RawContent>,
    coding_questions: Vec<RawContent>,
) -> RawTaskDetail {
    RawTaskDetail { pages, videos, documents: Vec::new(), coding_questions }
}

/// The two-topic course used by the navigation walkthrough
pub fn walkthrough_service() -> InMemoryService {
    InMemoryService::new("c1")
        .topic("A", 1)
        .topic("B", 2)
        .task(
            "A",
            "1",
            detail(
                vec![RawContent::new("p1", Some(0))],
                vec![RawContent::new("v1", Some(1)).completed(false)],
                Vec::new(),
            ),
        )
        .task(
            "B",
            "2",
            detail(Vec::new(), Vec::new(), vec![RawContent::new("c1", Some(0)).completed(false)]),
        )
}

#[async_trait]
impl CurriculumService for InMemoryService {
    async fn course_info(&self, _course_id: &str) -> Result<RawCourse, ApiError> {
        Ok(self.course.clone())
    }

    async fn list_topics(&self, _course_id: &str) -> Result<Vec<RawTopic>, ApiError> {
        self.topic_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.topic_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_topics.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.topics.clone())
    }

    async fn list_tasks(&self, topic_id: &str) -> Result<Vec<RawTask>, ApiError> {
        if self.failing_task_lists.lock().unwrap().iter().any(|t| t == topic_id) {
            return Err(unavailable());
        }
        Ok(self.tasks.get(topic_id).cloned().unwrap_or_default())
    }

    async fn task_detail(&self, task_id: &str) -> Result<RawTaskDetail, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_details.lock().unwrap().iter().any(|t| t == task_id) {
            return Err(unavailable());
        }
        Ok(self.details.get(task_id).cloned().unwrap_or_default())
    }

    async fn list_quiz_sets(&self, task_id: &str) -> Result<Vec<RawQuizSet>, ApiError> {
        Ok(self.quiz_sets.get(task_id).cloned().unwrap_or_default())
    }

    async fn mark_complete(&self, request: &CompletionRequest) -> Result<(), ApiError> {
        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.completions.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn reset_task_submissions(&self, task_id: &str) -> Result<(), ApiError> {
        if self.fail_reset.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.resets.lock().unwrap().push(task_id.to_string());
        Ok(())
    }

    async fn course_progress(&self, _course_id: &str) -> Result<RemoteProgress, ApiError> {
        let completed = self.completions.lock().unwrap().len() as u32;
        Ok(RemoteProgress { completed, total: 0, percentage: 0.0 })
    }
}
