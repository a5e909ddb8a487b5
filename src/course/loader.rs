//! Course fetching
//!
//! Task ids are unknown until the topic task lists resolve, so a course is
//! fetched in two phases: every per-topic task list in parallel, then the
//! per-task detail and quiz-set calls in bounded parallel batches. Each phase
//! settles completely before the tree is assembled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::LoadError;
use super::model::Course;
use super::normalize::{RawCourseBundle, RawTaskBundle, RawTopicBundle, normalize};
use crate::api::CurriculumService;
use crate::api::models::{RawQuizSet, RawTaskDetail};

type TaskFetch = (Result<RawTaskDetail, String>, Result<Vec<RawQuizSet>, String>);

/// Fetches and normalizes courses from a curriculum service
#[derive(Clone)]
pub struct CourseLoader {
    service: Arc<dyn CurriculumService>,
    /// Maximum number of tasks fetched at once in the second phase
    max_concurrent: usize,
}

impl CourseLoader {
    pub fn new(service: Arc<dyn CurriculumService>, max_concurrent: usize) -> Self {
        Self { service, max_concurrent: max_concurrent.max(1) }
    }

    /// Fetch and normalize a course
    pub async fn load(&self, course_id: &str) -> Result<Course, LoadError> {
        let bundle = self.fetch_bundle(course_id).await?;
        let course = normalize(bundle);
        info!(
            course = %course.id,
            topics = course.topics.len(),
            items = course.item_count(),
            issues = course.issues.len(),
            "Course loaded"
        );
        Ok(course)
    }

    /// Fetch everything a course needs, recording per-node failures
    pub async fn fetch_bundle(&self, course_id: &str) -> Result<RawCourseBundle, LoadError> {
        let service = self.service.as_ref();

        let (course, topics) =
            tokio::join!(service.course_info(course_id), service.list_topics(course_id));

        let topics = topics
            .map_err(|source| LoadError::Topics { course_id: course_id.to_string(), source })?;

        let course = match course {
            Ok(course) => Some(course),
            Err(e) => {
                warn!(
                    course = course_id,
                    error = %e,
                    "Course record unavailable; using id as title"
                );
                None
            }
        };

        // Phase 1: task lists for every topic
        let task_lists = join_all(topics.iter().map(|topic| async move {
            match topic.id.as_deref() {
                Some(topic_id) => {
                    Some(service.list_tasks(topic_id).await.map_err(|e| e.to_string()))
                }
                None => None,
            }
        }))
        .await;

        let attempted = task_lists.iter().filter(|r| r.is_some()).count();
        let failed = task_lists.iter().filter(|r| matches!(r, Some(Err(_)))).count();
        if attempted > 0 && failed == attempted {
            return Err(LoadError::TaskLists { course_id: course_id.to_string(), failed });
        }

        // Phase 2: detail and quiz sets for every active task, once per id
        let mut seen = HashSet::new();
        let task_ids: Vec<String> = task_lists
            .iter()
            .flatten()
            .flatten()
            .flatten()
            .filter(|task| task.is_active())
            .filter_map(|task| task.id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        debug!(course = course_id, tasks = task_ids.len(), "Fetching task content");

        let fetched: HashMap<String, TaskFetch> = stream::iter(task_ids)
            .map(|task_id| async move {
                let (detail, quiz_sets) =
                    tokio::join!(service.task_detail(&task_id), service.list_quiz_sets(&task_id));
                let fetch =
                    (detail.map_err(|e| e.to_string()), quiz_sets.map_err(|e| e.to_string()));
                (task_id, fetch)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let topics = topics
            .into_iter()
            .zip(task_lists)
            .map(|(topic, tasks)| {
                let tasks = tasks.unwrap_or_else(|| Ok(Vec::new())).map(|tasks| {
                    tasks
                        .into_iter()
                        .map(|task| {
                            // A task listed twice carries the same fetch on both copies
                            let fetch = task.id.as_deref().and_then(|id| fetched.get(id)).cloned();
                            match fetch {
                                Some((detail, quiz_sets)) => {
                                    RawTaskBundle { task, detail, quiz_sets }
                                }
                                None => RawTaskBundle::unfetched(task),
                            }
                        })
                        .collect()
                });
                RawTopicBundle { topic, tasks }
            })
            .collect();

        Ok(RawCourseBundle { course_id: course_id.to_string(), course, topics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{InMemoryService, detail, walkthrough_service};
    use crate::api::models::{RawContent, RawTask};
    use crate::course::model::{ContentKind, LoadIssue};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn loader(service: InMemoryService) -> (Arc<InMemoryService>, CourseLoader) {
        let service = Arc::new(service);
        (service.clone(), CourseLoader::new(service, 2))
    }

    #[tokio::test]
    async fn loads_walkthrough_course() {
        let (_, loader) = loader(walkthrough_service());
        let course = loader.load("c1").await.unwrap();

        assert_eq!(course.title, "Course c1");
        let topics: Vec<&str> = course.topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(topics, vec!["A", "B"]);
        assert_eq!(course.item_count(), 3);
        assert!(course.issues.is_empty());
    }

    #[tokio::test]
    async fn topic_failure_fails_the_load() {
        let service = walkthrough_service();
        service.set_fail_topics(true);
        let (_, loader) = loader(service);

        let err = loader.load("c1").await.unwrap_err();
        assert!(matches!(err, LoadError::Topics { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn every_task_list_failing_fails_the_load() {
        let service = walkthrough_service();
        *service.failing_task_lists.lock().unwrap() = vec!["A".into(), "B".into()];
        let (_, loader) = loader(service);

        let err = loader.load("c1").await.unwrap_err();
        assert!(matches!(err, LoadError::TaskLists { failed: 2, .. }));
    }

    #[tokio::test]
    async fn one_failed_task_list_drops_only_that_topic() {
        let service = walkthrough_service();
        *service.failing_task_lists.lock().unwrap() = vec!["A".into()];
        let (_, loader) = loader(service);

        let course = loader.load("c1").await.unwrap();
        assert_eq!(course.topics.len(), 1);
        assert_eq!(course.topics[0].id, "B");
        assert!(matches!(
            &course.issues[..],
            [LoadIssue::TaskListFailed { topic_id, .. }] if topic_id == "A"
        ));
    }

    #[tokio::test]
    async fn failed_detail_does_not_block_siblings() {
        let service = walkthrough_service().task(
            "A",
            "3",
            detail(vec![RawContent::new("p9", Some(0))], Vec::new(), Vec::new()),
        );
        *service.failing_details.lock().unwrap() = vec!["1".into()];
        let (_, loader) = loader(service);

        let course = loader.load("c1").await.unwrap();
        let task_three = course.task("3").unwrap();
        assert_eq!(task_three.items[0].kind(), ContentKind::Page);
        assert!(course.task("1").is_none());
        assert_eq!(course.issues.len(), 1);
    }

    #[tokio::test]
    async fn topic_without_loadable_tasks_is_dropped() {
        let service = walkthrough_service();
        *service.failing_details.lock().unwrap() = vec!["2".into()];
        let (_, loader) = loader(service);

        let course = loader.load("c1").await.unwrap();
        let topics: Vec<&str> = course.topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(topics, vec!["A"]);
        assert!(matches!(
            &course.issues[..],
            [LoadIssue::DetailFailed { task_id, .. }] if task_id == "2"
        ));
    }

    #[tokio::test]
    async fn task_listed_twice_is_fetched_once() {
        let mut service = walkthrough_service();
        service.tasks.get_mut("B").unwrap().push(RawTask {
            id: Some("1".into()),
            title: None,
            status: Some("active".into()),
        });
        let (service, loader) = loader(service);

        let course = loader.load("c1").await.unwrap();
        assert_eq!(service.detail_calls.load(Ordering::SeqCst), 2);

        let owners: Vec<&str> = course
            .tasks()
            .filter(|(_, task)| task.id == "1")
            .map(|(topic, _)| topic.id.as_str())
            .collect();
        assert_eq!(owners, vec!["A"]);
        assert_eq!(course.task("1").map(|t| t.items.len()), Some(2));
        assert!(matches!(
            &course.issues[..],
            [LoadIssue::DuplicateTask { task_id, topic_id }] if task_id == "1" && topic_id == "B"
        ));
    }

    #[tokio::test]
    async fn inactive_tasks_are_not_fetched() {
        let mut service = walkthrough_service();
        service.tasks.get_mut("A").unwrap().push(RawTask {
            id: Some("archived".into()),
            title: None,
            status: Some("inactive".into()),
        });
        let (service, loader) = loader(service);

        let course = loader.load("c1").await.unwrap();
        assert!(course.task("archived").is_none());
        assert_eq!(service.detail_calls.load(Ordering::SeqCst), 2);
    }
}
