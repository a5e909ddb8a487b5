//! Command-line application
//!
//! Each command opens a navigation session over the shared cache, restores
//! the saved position for the course, performs one operation and saves the
//! resulting position back to the session file.

pub mod outline;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::api::{CurriculumService, HttpCurriculumService, TokenStore};
use crate::cache::CourseCache;
use crate::config::Config;
use crate::config::session::Session;
use crate::course::ContentKind;
use crate::navigation::{NavigationController, Selection, Step};

/// Explicit position given on the command line
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub task_id: Option<String>,
    pub kind: Option<ContentKind>,
    pub id: Option<String>,
}

/// The main application
pub struct App {
    /// Application configuration
    config: Config,

    /// Saved course and positions
    session: Session,

    /// Where the session is written back to
    session_path: PathBuf,

    /// Course trees shared by every navigation session
    cache: Arc<CourseCache>,

    /// Curriculum service
    service: Arc<dyn CurriculumService>,
}

impl App {
    /// Create the application against the configured service
    pub fn new(config: Config) -> Result<Self> {
        let token = TokenStore::get_token()?;
        let service =
            HttpCurriculumService::new(&config.api_base_url, token, config.request_timeout())
                .context("Failed to build HTTP client")?;
        let session_path = Session::session_path()?;

        Self::with_service(config, Arc::new(service), session_path)
    }

    /// Create the application with an explicit service and session file
    pub fn with_service(
        config: Config,
        service: Arc<dyn CurriculumService>,
        session_path: PathBuf,
    ) -> Result<Self> {
        let session = Session::load_from(&session_path)?;
        let cache = Arc::new(CourseCache::new(config.freshness()));

        Ok(Self { config, session, session_path, cache, service })
    }

    fn controller(&self, course_id: &str) -> NavigationController {
        NavigationController::new(
            course_id,
            self.service.clone(),
            self.cache.clone(),
            self.config.max_concurrent_requests,
        )
    }

    fn current_course(&self) -> Result<String> {
        match &self.session.current_course_id {
            Some(id) => Ok(id.clone()),
            None => bail!("No course open. Run `syllabus open <course>` first"),
        }
    }

    /// Controller for a course with its saved position restored
    async fn resume(&self, course_id: &str) -> Result<NavigationController> {
        let mut nav = self.controller(course_id);
        nav.load().await?;

        if let Some(key) = self.session.position(course_id) {
            let selection = nav.select(&key.task_id, key.kind, &key.id).await;
            if let Err(e) = selection {
                warn!(error = %e, "Saved position is no longer valid");
            }
        }
        Ok(nav)
    }

    fn remember(&mut self, nav: &NavigationController) -> Result<()> {
        self.session.open(nav.course_id());
        if let Some(position) = nav.current() {
            self.session.set_position(nav.course_id(), position.key());
        }
        self.session.save_to(&self.session_path)
    }

    fn describe(&self, nav: &NavigationController, selection: &Selection) -> Result<String> {
        let lookup = self.cache.get(nav.course_id()).context("Course is not loaded")?;
        Ok(outline::render_position(&lookup.course, &selection.position, selection.redirected))
    }

    /// Course tree with statuses
    pub async fn outline(&mut self, course_id: &str) -> Result<String> {
        let nav = self.resume(course_id).await?;
        let course = nav.course().context("Course is not loaded")?;
        let current = nav.current().map(|p| p.key());
        Ok(outline::render_outline(&course, current.as_ref()))
    }

    /// Local and server-side progress
    pub async fn progress(&mut self, course_id: &str) -> Result<String> {
        let nav = self.resume(course_id).await?;
        let course = nav.course().context("Course is not loaded")?;

        let remote = match nav.remote_progress().await {
            Ok(remote) => Some(remote),
            Err(e) => {
                warn!(error = %e, "Server progress unavailable");
                None
            }
        };

        Ok(outline::render_progress(&course, &nav.topic_progress(), remote.as_ref()))
    }

    /// Open a course, optionally at an explicit position
    pub async fn open(&mut self, course_id: &str, target: Target) -> Result<String> {
        let mut nav = self.resume(course_id).await?;

        let selection = match (target.task_id, target.kind, target.id) {
            (Some(task_id), Some(kind), Some(id)) => nav.select(&task_id, kind, &id).await?,
            (Some(task_id), _, _) => nav.select_task(&task_id).await?,
            (None, _, _) => match nav.current().cloned() {
                Some(position) => Selection { position, redirected: false },
                None => match nav.go_next().await? {
                    Step::Moved(position) => Selection { position, redirected: false },
                    Step::End => bail!("Course {course_id} has no content"),
                },
            },
        };

        self.remember(&nav)?;
        self.describe(&nav, &selection)
    }

    /// Step forward from the saved position
    pub async fn next(&mut self) -> Result<String> {
        self.step(true).await
    }

    /// Step backward from the saved position
    pub async fn prev(&mut self) -> Result<String> {
        self.step(false).await
    }

    async fn step(&mut self, forward: bool) -> Result<String> {
        let course_id = self.current_course()?;
        let mut nav = self.resume(&course_id).await?;

        let step = if forward { nav.go_next().await? } else { nav.go_prev().await? };
        match step {
            Step::Moved(position) => {
                self.remember(&nav)?;
                self.describe(&nav, &Selection { position, redirected: false })
            }
            Step::End => Ok("No further content.".to_string()),
        }
    }

    /// Complete the item at the saved position
    pub async fn complete(&mut self) -> Result<String> {
        let course_id = self.current_course()?;
        let mut nav = self.resume(&course_id).await?;

        let Some(outcome) = nav.complete_current().await? else {
            bail!("No current item. Run `syllabus open {course_id}` first");
        };

        let mut message =
            format!("Completed {}. {}", outcome.key, outline::progress_line(&outcome.progress));
        if let Some(err) = &outcome.persist_error {
            message.push_str(&format!("\nWarning: not saved to the server ({err})"));
        }
        self.remember(&nav)?;
        Ok(message)
    }

    /// Reset the task at the saved position so it can be retaken
    pub async fn reattempt(&mut self) -> Result<String> {
        let course_id = self.current_course()?;
        let mut nav = self.resume(&course_id).await?;

        let Some(task_id) = nav.current().map(|p| p.task_id.clone()) else {
            bail!("No current item. Run `syllabus open {course_id}` first");
        };

        let progress = nav.reattempt(&task_id).await?;
        if let Ok(first) = nav.select_task(&task_id).await {
            self.remember(&nav)?;
            return Ok(format!(
                "Task {task_id} reset. {}\n{}",
                outline::progress_line(&progress),
                self.describe(&nav, &first)?
            ));
        }
        Ok(format!("Task {task_id} reset. {}", outline::progress_line(&progress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::walkthrough_service;
    use std::sync::atomic::Ordering;

    fn app(dir: &tempfile::TempDir) -> (Arc<crate::api::memory::InMemoryService>, App) {
        let service = Arc::new(walkthrough_service());
        let session_path = dir.path().join("session.json");
        let app = App::with_service(Config::default(), service.clone(), session_path).unwrap();
        (service, app)
    }

    #[tokio::test]
    async fn open_starts_at_first_item_and_saves_position() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut app) = app(&dir);

        let text = app.open("c1", Target::default()).await.unwrap();
        assert!(text.contains("page p1"));

        let saved = Session::load_from(&dir.path().join("session.json")).unwrap();
        assert_eq!(saved.current_course_id.as_deref(), Some("c1"));
        assert_eq!(saved.position("c1").map(|k| k.id.as_str()), Some("p1"));
    }

    #[tokio::test]
    async fn next_resumes_from_saved_position() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut app) = app(&dir);
        app.open("c1", Target::default()).await.unwrap();

        // A fresh app reads the position back from disk
        let (_, mut app) = self::app(&dir);
        assert!(app.next().await.unwrap().contains("video v1"));
        assert!(app.next().await.unwrap().contains("coding_question c1"));
        assert_eq!(app.next().await.unwrap(), "No further content.");
        assert!(app.prev().await.unwrap().contains("video v1"));
    }

    #[tokio::test]
    async fn complete_reports_progress_and_persist_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mut app) = app(&dir);
        let target = Target {
            task_id: Some("1".into()),
            kind: Some(ContentKind::Video),
            id: Some("v1".into()),
        };
        app.open("c1", target).await.unwrap();

        service.fail_completion.store(true, Ordering::SeqCst);
        let message = app.complete().await.unwrap();
        assert!(message.contains("1/2 graded items complete (50%)"));
        assert!(message.contains("Warning: not saved"));
    }

    #[tokio::test]
    async fn commands_need_an_open_course() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut app) = app(&dir);
        assert!(app.next().await.is_err());
        assert!(app.complete().await.is_err());
    }

    #[tokio::test]
    async fn outline_marks_saved_position() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut app) = app(&dir);
        let target = Target { task_id: Some("2".into()), ..Target::default() };
        app.open("c1", target).await.unwrap();

        let text = app.outline("c1").await.unwrap();
        assert!(text.contains("▶ ○ coding_question c1"));
    }

    #[tokio::test]
    async fn reattempt_clears_task_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mut app) = app(&dir);
        let target = Target {
            task_id: Some("1".into()),
            kind: Some(ContentKind::Video),
            id: Some("v1".into()),
        };
        app.open("c1", target).await.unwrap();
        app.complete().await.unwrap();

        let message = app.reattempt().await.unwrap();
        assert!(message.contains("Task 1 reset. 0/2 graded items complete (0%)"));
        assert_eq!(*service.resets.lock().unwrap(), vec!["1".to_string()]);
    }
}
