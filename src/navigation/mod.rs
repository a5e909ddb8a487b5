//! Navigation controller
//!
//! Drives loader, cache, sequencer and progress aggregation for one course
//! session, and owns the only mutating entry points: selecting a position,
//! stepping through the sequence, completing an item and reattempting a task.

pub mod state;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use state::SessionState;

use crate::api::{ApiError, CompletionRequest, CurriculumService, RemoteProgress};
use crate::cache::{CacheError, CourseCache};
use crate::course::{ContentKind, Course, CourseLoader, ItemKey, LoadError};
use crate::progress::{self, ProgressSnapshot, TopicProgress};
use crate::sequence::{Position, Sequence};

/// Errors surfaced by navigation operations
#[derive(Debug, Error)]
pub enum NavigationError {
    /// No tree could be loaded and none was cached
    #[error("Course {course_id} is temporarily unavailable: {source}")]
    Load {
        course_id: String,
        #[source]
        source: CacheError,
    },

    #[error("Task {task_id} is not part of course {course_id}")]
    UnknownTask { course_id: String, task_id: String },

    #[error("Task {task_id} has no content")]
    EmptyTask { task_id: String },

    #[error("No content item {key}")]
    ItemNotFound { key: ItemKey },

    /// The service refused to discard prior submissions
    #[error("Failed to reset submissions for task {task_id}: {source}")]
    Reset {
        task_id: String,
        #[source]
        source: ApiError,
    },
}

impl NavigationError {
    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            NavigationError::Load { source, .. } => source.is_transient(),
            NavigationError::Reset { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Where a `select` landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub position: Position,
    /// The requested triple was not found as given; the caller should update
    /// whatever external state records the position
    pub redirected: bool,
}

/// Result of stepping through the sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved(Position),
    /// No further content in that direction
    End,
}

/// Result of completing an item
///
/// The local tree is updated either way; `persist_error` carries a failed
/// server write so the caller can warn without undoing anything.
#[derive(Debug)]
pub struct CompletionOutcome {
    pub key: ItemKey,
    pub progress: ProgressSnapshot,
    pub persist_error: Option<ApiError>,
}

impl CompletionOutcome {
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Navigation over one course, backed by a shared cache
pub struct NavigationController {
    course_id: String,
    service: Arc<dyn CurriculumService>,
    loader: CourseLoader,
    cache: Arc<CourseCache>,
    state: SessionState,
    current: Option<Position>,
}

impl NavigationController {
    pub fn new(
        course_id: impl Into<String>,
        service: Arc<dyn CurriculumService>,
        cache: Arc<CourseCache>,
        max_concurrent: usize,
    ) -> Self {
        let loader = CourseLoader::new(service.clone(), max_concurrent);
        Self {
            course_id: course_id.into(),
            service,
            loader,
            cache,
            state: SessionState::Uninitialized,
            current: None,
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current position, if one has been selected
    pub fn current(&self) -> Option<&Position> {
        self.current.as_ref()
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected session transition");
        }
        debug!(course = %self.course_id, from = %self.state, to = %next, "Session transition");
        self.state = next;
    }

    /// Return to `Ready` after a navigating or completing operation
    fn settle<T>(&mut self, result: Result<T, NavigationError>) -> Result<T, NavigationError> {
        self.transition(SessionState::Ready);
        result
    }

    fn fetcher(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Course, LoadError>> + Send + 'static {
        let loader = self.loader.clone();
        let course_id = self.course_id.clone();
        move || async move { loader.load(&course_id).await }.boxed()
    }

    fn load_error(&self, source: CacheError) -> NavigationError {
        NavigationError::Load { course_id: self.course_id.clone(), source }
    }

    /// Load the course, serving a cached tree when there is one
    ///
    /// A stale tree is returned at once and refreshed in the background.
    pub async fn load(&mut self) -> Result<Arc<Course>, NavigationError> {
        self.transition(SessionState::Loading);

        let fetcher = self.fetcher();
        match self.cache.get_or_refresh(&self.course_id, fetcher).await {
            Ok(lookup) => {
                self.transition(SessionState::Ready);
                Ok(lookup.course)
            }
            Err(source) => {
                self.transition(SessionState::Error);
                Err(self.load_error(source))
            }
        }
    }

    /// Fetch the course again regardless of freshness
    ///
    /// On failure the previous tree stays cached and keeps being served.
    pub async fn refresh(&mut self) -> Result<Arc<Course>, NavigationError> {
        self.transition(SessionState::Loading);

        let fetcher = self.fetcher();
        match self.cache.revalidate(&self.course_id, fetcher).await {
            Ok(course) => {
                info!(course = %self.course_id, "Course refreshed");
                self.transition(SessionState::Ready);
                Ok(course)
            }
            Err(source) => {
                self.transition(SessionState::Error);
                Err(self.load_error(source))
            }
        }
    }

    /// Tree to navigate, loading first unless the session is ready
    async fn tree(&mut self) -> Result<Arc<Course>, NavigationError> {
        if self.state.is_ready() {
            if let Some(lookup) = self.cache.get(&self.course_id) {
                return Ok(lookup.course);
            }
        }
        self.load().await
    }

    /// Move to an item
    ///
    /// Falls back to the task's first item when the exact item is gone. A
    /// quiz group may be addressed by its backing quiz-set id.
    pub async fn select(
        &mut self,
        task_id: &str,
        kind: ContentKind,
        id: &str,
    ) -> Result<Selection, NavigationError> {
        let course = self.tree().await?;
        self.transition(SessionState::Navigating);
        let result = self.resolve(&course, task_id, kind, id);
        if let Ok(selection) = &result {
            self.current = Some(selection.position.clone());
        }
        self.settle(result)
    }

    /// Move to the first item of a task
    pub async fn select_task(&mut self, task_id: &str) -> Result<Selection, NavigationError> {
        let course = self.tree().await?;
        self.transition(SessionState::Navigating);

        let sequence = Sequence::flatten(&course);
        let result = self
            .first_of(&sequence, task_id)
            .map(|position| Selection { position, redirected: false });
        if let Ok(selection) = &result {
            self.current = Some(selection.position.clone());
        }
        self.settle(result)
    }

    fn resolve(
        &self,
        course: &Course,
        task_id: &str,
        kind: ContentKind,
        id: &str,
    ) -> Result<Selection, NavigationError> {
        let sequence = Sequence::flatten(course);

        if let Some(position) = sequence.index_of(task_id, kind, id).and_then(|i| sequence.get(i)) {
            return Ok(Selection { position: position.clone(), redirected: false });
        }

        if kind == ContentKind::McqGroup {
            let alias = course
                .task(task_id)
                .and_then(|task| task.resolve_quiz_alias(id))
                .and_then(|group| sequence.index_of(task_id, ContentKind::McqGroup, &group.id))
                .and_then(|i| sequence.get(i));
            if let Some(position) = alias {
                debug!(task = task_id, alias = id, group = %position.id, "Resolved quiz alias");
                return Ok(Selection { position: position.clone(), redirected: true });
            }
        }

        debug!(task = task_id, %kind, id, "Item not found; falling back to task start");
        let position = self.first_of(&sequence, task_id)?;
        Ok(Selection { position, redirected: true })
    }

    fn first_of(&self, sequence: &Sequence, task_id: &str) -> Result<Position, NavigationError> {
        if !sequence.has_task(task_id) {
            return Err(NavigationError::UnknownTask {
                course_id: self.course_id.clone(),
                task_id: task_id.to_string(),
            });
        }
        sequence
            .first_of_task(task_id)
            .cloned()
            .ok_or_else(|| NavigationError::EmptyTask { task_id: task_id.to_string() })
    }

    /// Step forward through the sequence
    pub async fn go_next(&mut self) -> Result<Step, NavigationError> {
        self.step(true).await
    }

    /// Step backward through the sequence
    pub async fn go_prev(&mut self) -> Result<Step, NavigationError> {
        self.step(false).await
    }

    async fn step(&mut self, forward: bool) -> Result<Step, NavigationError> {
        let course = self.tree().await?;
        self.transition(SessionState::Navigating);

        let sequence = Sequence::flatten(&course);
        let target = match &self.current {
            // Nothing selected yet: forward starts the course
            None if forward => sequence.get(0),
            None => None,
            Some(current) => match sequence.index_of_key(&current.key()) {
                Some(index) if forward => sequence.next(index),
                Some(index) => sequence.prev(index),
                // Current item vanished on refresh: land on its task, or the start
                None => {
                    debug!(position = %current, "Current position no longer in course");
                    sequence.first_of_task(&current.task_id).or_else(|| sequence.get(0))
                }
            },
        };

        let step = match target {
            Some(position) => {
                self.current = Some(position.clone());
                Step::Moved(position.clone())
            }
            None => Step::End,
        };
        self.settle(Ok(step))
    }

    /// Mark an item complete
    ///
    /// The cached tree is updated before the server write is awaited and is
    /// kept even if the write fails.
    pub async fn complete(
        &mut self,
        task_id: &str,
        kind: ContentKind,
        id: &str,
    ) -> Result<CompletionOutcome, NavigationError> {
        let course = self.tree().await?;

        let key = ItemKey::new(task_id, kind, id);
        let Some(item) = course.find_item(task_id, kind, id) else {
            return Err(NavigationError::ItemNotFound { key });
        };
        let request = CompletionRequest::for_item(&self.course_id, &key, item);

        self.transition(SessionState::Completing);

        let completed = key.clone();
        let updated = self
            .cache
            .replace_with(&self.course_id, move |tree| progress::apply_completion(tree, &completed))
            .unwrap_or_else(|| Arc::new(progress::apply_completion(&course, &key)));

        let persist_error = match self.service.mark_complete(&request).await {
            Ok(()) => {
                debug!(item = %key, "Completion persisted");
                None
            }
            Err(err) => {
                warn!(item = %key, error = %err, "Completion not persisted; keeping local state");
                Some(err)
            }
        };

        let outcome =
            CompletionOutcome { progress: progress::summarize(&updated), key, persist_error };
        self.settle(Ok(outcome))
    }

    /// Complete the item at the current position
    pub async fn complete_current(&mut self) -> Result<Option<CompletionOutcome>, NavigationError> {
        let Some(current) = self.current.clone() else {
            return Ok(None);
        };
        self.complete(&current.task_id, current.kind, &current.id).await.map(Some)
    }

    /// Discard a task's submissions and completion state so it can be retaken
    ///
    /// The service reset runs first; local state is only cleared once it
    /// succeeds.
    pub async fn reattempt(&mut self, task_id: &str) -> Result<ProgressSnapshot, NavigationError> {
        let course = self.tree().await?;
        if course.task(task_id).is_none() {
            return Err(NavigationError::UnknownTask {
                course_id: self.course_id.clone(),
                task_id: task_id.to_string(),
            });
        }

        self.transition(SessionState::Completing);

        if let Err(source) = self.service.reset_task_submissions(task_id).await {
            warn!(task = task_id, error = %source, "Submission reset failed");
            let err = NavigationError::Reset { task_id: task_id.to_string(), source };
            return self.settle(Err(err));
        }

        let reset = task_id.to_string();
        let updated = self
            .cache
            .replace_with(&self.course_id, move |tree| progress::apply_reset(tree, &reset))
            .unwrap_or_else(|| Arc::new(progress::apply_reset(&course, task_id)));

        info!(task = task_id, "Task reset for reattempt");
        self.settle(Ok(progress::summarize(&updated)))
    }

    /// Cached tree for this course, without fetching
    pub fn course(&self) -> Option<Arc<Course>> {
        self.cache.get(&self.course_id).map(|lookup| lookup.course)
    }

    /// Progress over the cached tree
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        self.cache.get(&self.course_id).map(|lookup| progress::summarize(&lookup.course))
    }

    /// Per-topic progress over the cached tree
    pub fn topic_progress(&self) -> Vec<TopicProgress> {
        self.cache
            .get(&self.course_id)
            .map(|lookup| progress::summarize_topics(&lookup.course))
            .unwrap_or_default()
    }

    /// Flattened sequence of the cached tree
    pub fn sequence(&self) -> Option<Sequence> {
        self.cache.get(&self.course_id).map(|lookup| Sequence::flatten(&lookup.course))
    }

    /// Items of the current task, in order
    pub fn siblings(&self) -> Vec<Position> {
        match (&self.current, self.sequence()) {
            (Some(current), Some(sequence)) => sequence.task_entries(&current.task_id).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Progress as the service computes it
    pub async fn remote_progress(&self) -> Result<RemoteProgress, ApiError> {
        self.service.course_progress(&self.course_id).await
    }
}
