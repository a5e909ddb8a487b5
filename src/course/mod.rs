//! Course tree construction
//!
//! Fetches a course from the curriculum service and normalizes it into the
//! canonical topic/task/item tree the rest of the engine walks.

pub mod loader;
pub mod model;
pub mod normalize;

use thiserror::Error;

use crate::api::ApiError;

pub use loader::CourseLoader;
pub use model::{
    ContentItem, ContentKind, ContentPayload, Course, ItemKey, LoadIssue, QuizGroup, QuizQuestion,
    Task, Topic,
};
pub use normalize::normalize;

/// Failures that leave no usable course tree
#[derive(Debug, Error)]
pub enum LoadError {
    /// The topic listing itself failed
    #[error("Failed to list topics for course {course_id}: {source}")]
    Topics {
        course_id: String,
        #[source]
        source: ApiError,
    },

    /// Every attempted task list failed
    #[error("All {failed} task lists failed for course {course_id}")]
    TaskLists { course_id: String, failed: usize },
}

impl LoadError {
    /// Whether retrying the load later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LoadError::Topics { source, .. } => source.is_recoverable(),
            LoadError::TaskLists { .. } => true,
        }
    }

    /// Course the failed load was for
    pub fn course_id(&self) -> &str {
        match self {
            LoadError::Topics { course_id, .. } | LoadError::TaskLists { course_id, .. } => {
                course_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_topics_are_not_transient() {
        let err = LoadError::Topics { course_id: "c1".into(), source: ApiError::Unauthorized };
        assert!(!err.is_transient());
        assert_eq!(err.course_id(), "c1");
    }

    #[test]
    fn task_list_failure_message() {
        let err = LoadError::TaskLists { course_id: "c1".into(), failed: 3 };
        assert_eq!(err.to_string(), "All 3 task lists failed for course c1");
        assert!(err.is_transient());
    }
}
