//! Syllabus - course progression and caching for a curriculum client
//!
//! Syllabus loads a course from a remote curriculum service, normalizes it
//! into one ordered sequence of content items, tracks completion across
//! pages, videos, documents, quiz groups and coding questions, and caches
//! courses with stale-while-revalidate and single-flight population.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod course;
pub mod navigation;
pub mod progress;
pub mod sequence;

pub use api::{ApiError, CurriculumService, HttpCurriculumService};
pub use app::App;
pub use cache::{CacheError, Clock, CourseCache};
pub use config::Config;
pub use course::{ContentKind, Course, CourseLoader, ItemKey, LoadError};
pub use navigation::{NavigationController, NavigationError, SessionState, Step};
pub use progress::ProgressSnapshot;
pub use sequence::{Position, Sequence};
