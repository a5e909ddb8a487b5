//! Curriculum service integration
//!
//! Defines the service boundary the engine fetches from and persists to,
//! plus the HTTP implementation and bearer-token storage.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

// Re-export commonly used types
pub use auth::TokenStore;
pub use client::HttpCurriculumService;
pub use error::ApiError;
pub use models::{
    CompletionRequest, RawContent, RawCourse, RawQuizQuestion, RawQuizSet, RawTask, RawTaskDetail,
    RawTopic, RemoteProgress,
};

/// Remote curriculum service
#[async_trait]
pub trait CurriculumService: Send + Sync {
    /// Course record (title, description)
    async fn course_info(&self, course_id: &str) -> Result<RawCourse, ApiError>;

    /// Topics of a course
    async fn list_topics(&self, course_id: &str) -> Result<Vec<RawTopic>, ApiError>;

    /// Tasks of a topic, in display order
    async fn list_tasks(&self, topic_id: &str) -> Result<Vec<RawTask>, ApiError>;

    /// Pages, videos, documents and coding questions of a task
    async fn task_detail(&self, task_id: &str) -> Result<RawTaskDetail, ApiError>;

    /// Quiz sets of a task
    async fn list_quiz_sets(&self, task_id: &str) -> Result<Vec<RawQuizSet>, ApiError>;

    /// Record a completed content item
    async fn mark_complete(&self, request: &CompletionRequest) -> Result<(), ApiError>;

    /// Discard prior quiz submissions for a task
    async fn reset_task_submissions(&self, task_id: &str) -> Result<(), ApiError>;

    /// Backend-computed course progress
    async fn course_progress(&self, course_id: &str) -> Result<RemoteProgress, ApiError>;
}
