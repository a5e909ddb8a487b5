//! HTTP client for the curriculum service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::CurriculumService;
use super::error::ApiError;
use super::models::{
    CompletionRequest, RawCourse, RawQuizSet, RawTask, RawTaskDetail, RawTopic, RemoteProgress,
};

/// Curriculum service reached over HTTP with a bearer token
pub struct HttpCurriculumService {
    /// HTTP client
    client: Client,
    /// Base URL; every path segment is appended to it
    base_url: Url,
    /// Bearer token attached to every call
    token: String,
}

impl HttpCurriculumService {
    /// Create a client for the given base URL
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into();
        let base_url = match Url::parse(&base_url) {
            Ok(url) if !url.cannot_be_a_base() => url,
            _ => return Err(ApiError::InvalidUrl(base_url)),
        };

        Ok(Self { client, base_url, token: token.into() })
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint URL; each segment is percent-encoded, so ids cannot add path
    /// segments, a query or a fragment
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token).header("accept", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        tracing::debug!(path = url.path(), "GET");
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(ApiError::RateLimited { retry_after_seconds: retry_after });
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status: status.as_u16(), message });
    }

    Ok(response)
}

#[async_trait]
impl CurriculumService for HttpCurriculumService {
    async fn course_info(&self, course_id: &str) -> Result<RawCourse, ApiError> {
        self.get_json(&["courses", course_id]).await
    }

    async fn list_topics(&self, course_id: &str) -> Result<Vec<RawTopic>, ApiError> {
        self.get_json(&["courses", course_id, "topics"]).await
    }

    async fn list_tasks(&self, topic_id: &str) -> Result<Vec<RawTask>, ApiError> {
        self.get_json(&["topics", topic_id, "tasks"]).await
    }

    async fn task_detail(&self, task_id: &str) -> Result<RawTaskDetail, ApiError> {
        self.get_json(&["tasks", task_id]).await
    }

    async fn list_quiz_sets(&self, task_id: &str) -> Result<Vec<RawQuizSet>, ApiError> {
        self.get_json(&["tasks", task_id, "quiz-sets"]).await
    }

    async fn mark_complete(&self, request: &CompletionRequest) -> Result<(), ApiError> {
        tracing::debug!(task = %request.task_id, content = %request.content_id, "POST completion");
        let response = self
            .authorized(self.client.post(self.url(&["progress", "complete"])?))
            .json(request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn reset_task_submissions(&self, task_id: &str) -> Result<(), ApiError> {
        tracing::debug!(task = task_id, "DELETE submissions");
        let response = self
            .authorized(self.client.delete(self.url(&["tasks", task_id, "submissions"])?))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn course_progress(&self, course_id: &str) -> Result<RemoteProgress, ApiError> {
        self.get_json(&["courses", course_id, "progress"]).await
    }
}
