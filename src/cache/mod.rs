//! Course cache
//!
//! Holds one normalized tree per course with a freshness window. Stale trees
//! are served while a refresh runs in the background, and at most one
//! population per course is in flight at any time: later callers subscribe
//! to the running fetch instead of starting their own.
//!
//! Trees are swapped whole behind an `Arc`, so readers see either the old
//! tree or the new one. A failed fetch never evicts what was there.
//!
//! Local updates made through [`CourseCache::replace_with`] are journaled
//! and replayed onto every tree fetched afterwards, so a fetch that raced a
//! completion cannot undo it. Only [`CourseCache::invalidate`] drops them.

pub mod clock;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use clock::Clock;

use crate::course::{Course, LoadError};

/// Errors delivered to population callers
///
/// Cloneable so one failure can reach every caller waiting on the same fetch.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The fetch ran and failed
    #[error(transparent)]
    Load(Arc<LoadError>),

    /// The caller running the fetch went away before it finished
    #[error("Population of course {course_id} was abandoned")]
    Abandoned { course_id: String },
}

impl CacheError {
    /// Whether a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Load(err) => err.is_transient(),
            CacheError::Abandoned { .. } => true,
        }
    }
}

impl From<LoadError> for CacheError {
    fn from(err: LoadError) -> Self {
        CacheError::Load(Arc::new(err))
    }
}

type Fetched = Result<Arc<Course>, CacheError>;

/// A local edit to a cached tree, kept for replay onto later fetches
type Update = Arc<dyn Fn(&Course) -> Course + Send + Sync>;

/// A cached tree and when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub course: Arc<Course>,
    pub fetched_at: Instant,
}

/// Result of a cache read
#[derive(Debug, Clone)]
pub struct Lookup {
    pub course: Arc<Course>,
    /// Whether the entry is still inside the freshness window
    pub fresh: bool,
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    /// Present while a population runs; followers subscribe to it
    in_flight: Option<broadcast::Sender<Fetched>>,
    /// Local updates in the order they were made
    journal: Vec<Update>,
}

enum Role {
    Leader(broadcast::Sender<Fetched>),
    Follower(broadcast::Receiver<Fetched>),
}

/// Per-course tree cache with stale-while-revalidate and single-flight population
pub struct CourseCache {
    freshness: Duration,
    clock: Clock,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CourseCache {
    pub fn new(freshness: Duration) -> Self {
        Self::with_clock(freshness, Clock::system())
    }

    pub fn with_clock(freshness: Duration, clock: Clock) -> Self {
        Self { freshness, clock, slots: Mutex::new(HashMap::new()) }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    // Entries are replaced whole, so a panic mid-update leaves nothing torn
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now().saturating_duration_since(entry.fetched_at) < self.freshness
    }

    /// Read the current entry without fetching
    pub fn get(&self, course_id: &str) -> Option<Lookup> {
        let slots = self.slots();
        let entry = slots.get(course_id)?.entry.as_ref()?;
        Some(Lookup { course: entry.course.clone(), fresh: self.is_fresh(entry) })
    }

    /// Whether a population is running for the course
    pub fn is_in_flight(&self, course_id: &str) -> bool {
        self.slots().get(course_id).is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Return the fresh entry, or fetch one
    ///
    /// Concurrent calls for the same course share a single fetch.
    pub async fn populate<F, Fut>(
        &self,
        course_id: &str,
        fetcher: F,
    ) -> Result<Arc<Course>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Course, LoadError>>,
    {
        if let Some(lookup) = self.get(course_id).filter(|lookup| lookup.fresh) {
            debug!(course = course_id, "Cache hit");
            return Ok(lookup.course);
        }
        self.revalidate(course_id, fetcher).await
    }

    /// Fetch regardless of freshness, joining a running fetch if there is one
    ///
    /// On success the entry is replaced; on failure the previous entry stays.
    pub async fn revalidate<F, Fut>(
        &self,
        course_id: &str,
        fetcher: F,
    ) -> Result<Arc<Course>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Course, LoadError>>,
    {
        match self.claim(course_id) {
            Role::Leader(sender) => self.lead(course_id, sender, fetcher).await,
            Role::Follower(mut receiver) => {
                debug!(course = course_id, "Joining in-flight population");
                receiver.recv().await.unwrap_or_else(|_| {
                    Err(CacheError::Abandoned { course_id: course_id.to_string() })
                })
            }
        }
    }

    /// Become the fetching caller for a course, or subscribe to the one running
    fn claim(&self, course_id: &str) -> Role {
        let mut slots = self.slots();
        let slot = slots.entry(course_id.to_string()).or_default();
        match &slot.in_flight {
            Some(sender) => Role::Follower(sender.subscribe()),
            None => {
                let (sender, _) = broadcast::channel(1);
                slot.in_flight = Some(sender.clone());
                Role::Leader(sender)
            }
        }
    }

    async fn lead<F, Fut>(
        &self,
        course_id: &str,
        sender: broadcast::Sender<Fetched>,
        fetcher: F,
    ) -> Result<Arc<Course>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Course, LoadError>>,
    {
        let mut guard = InFlightGuard { cache: self, course_id, armed: true };
        let result = fetcher().await;
        guard.armed = false;

        let outcome: Fetched = {
            let mut slots = self.slots();
            let slot = slots.entry(course_id.to_string()).or_default();
            slot.in_flight = None;

            match result {
                Ok(course) => {
                    if !slot.journal.is_empty() {
                        debug!(
                            course = course_id,
                            updates = slot.journal.len(),
                            "Replaying local updates"
                        );
                    }
                    let course = slot.journal.iter().fold(course, |tree, update| update(&tree));
                    let course = Arc::new(course);
                    slot.entry =
                        Some(CacheEntry { course: course.clone(), fetched_at: self.clock.now() });
                    info!(course = course_id, "Cache populated");
                    Ok(course)
                }
                Err(err) => {
                    warn!(
                        course = course_id,
                        error = %err,
                        stale_kept = slot.entry.is_some(),
                        "Cache population failed"
                    );
                    Err(CacheError::from(err))
                }
            }
        };

        // No receivers just means nobody else was waiting
        let _ = sender.send(outcome.clone());
        outcome
    }

    /// Serve whatever is cached, refreshing stale entries in the background
    ///
    /// Only a missing entry makes the caller wait for a fetch. The background
    /// refresh is registered as in flight before this returns.
    pub async fn get_or_refresh<F, Fut>(
        self: &Arc<Self>,
        course_id: &str,
        fetcher: F,
    ) -> Result<Lookup, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Course, LoadError>> + Send + 'static,
    {
        match self.get(course_id) {
            Some(lookup) if lookup.fresh => Ok(lookup),
            Some(lookup) => {
                if let Role::Leader(sender) = self.claim(course_id) {
                    debug!(course = course_id, "Serving stale entry; refreshing in background");
                    let cache = Arc::clone(self);
                    let course_id = course_id.to_string();
                    tokio::spawn(async move {
                        if let Err(err) = cache.lead(&course_id, sender, fetcher).await {
                            warn!(course = %course_id, error = %err, "Background refresh failed");
                        }
                    });
                }
                Ok(lookup)
            }
            None => {
                let course = self.revalidate(course_id, fetcher).await?;
                Ok(Lookup { course, fresh: true })
            }
        }
    }

    /// Replace the cached tree with one derived from it
    ///
    /// Keeps the original fetch time. The update is also replayed onto every
    /// later fetch, including one already running. Returns the new tree, or
    /// `None` when nothing is cached for the course.
    pub fn replace_with<F>(&self, course_id: &str, update: F) -> Option<Arc<Course>>
    where
        F: Fn(&Course) -> Course + Send + Sync + 'static,
    {
        let mut slots = self.slots();
        let slot = slots.get_mut(course_id)?;
        let update: Update = Arc::new(update);
        slot.journal.push(update.clone());

        let entry = slot.entry.as_mut()?;
        let course = Arc::new(update(&entry.course));
        entry.course = course.clone();
        Some(course)
    }

    /// Discard the entry and its local updates so the next population does a
    /// full fetch
    ///
    /// A fetch already running is left alone.
    pub fn invalidate(&self, course_id: &str) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(course_id) {
            if slot.entry.take().is_some() {
                debug!(course = course_id, "Cache entry invalidated");
            }
            slot.journal.clear();
            if slot.in_flight.is_none() {
                slots.remove(course_id);
            }
        }
    }
}

/// Clears the in-flight marker if the leading fetch is dropped mid-way
struct InFlightGuard<'a> {
    cache: &'a CourseCache,
    course_id: &'a str,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(course = self.course_id, "Population dropped before completing");
            if let Some(slot) = self.cache.slots().get_mut(self.course_id) {
                slot.in_flight = None;
            }
        }
    }
}
