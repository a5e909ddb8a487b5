//! Sequencer
//!
//! Flattens a course tree into one linear reading order and answers
//! "what comes before/after this position". Pure: a sequence is derived from
//! a tree snapshot and rebuilt whenever the tree is replaced.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::course::model::{ContentKind, Course, ItemKey};

/// One entry of the flattened sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub topic_id: String,
    pub task_id: String,
    pub kind: ContentKind,
    pub id: String,
}

impl Position {
    /// Identity of the item at this position
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.task_id.clone(), self.kind, self.id.clone())
    }

    /// Exact (task, kind, id) match; the topic is implied by the task
    pub fn matches(&self, task_id: &str, kind: ContentKind, id: &str) -> bool {
        self.kind == kind && self.task_id == task_id && self.id == id
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.topic_id, self.task_id, self.kind, self.id)
    }
}

/// A course flattened into reading order
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    entries: Vec<Position>,
    index: HashMap<ItemKey, usize>,
    tasks: HashMap<String, Range<usize>>,
}

impl Sequence {
    /// Walk topics, tasks and items in tree order
    pub fn flatten(course: &Course) -> Self {
        let mut entries = Vec::with_capacity(course.item_count());
        let mut index = HashMap::with_capacity(course.item_count());
        let mut tasks = HashMap::new();

        for (topic, task) in course.tasks() {
            let start = entries.len();
            for item in &task.items {
                let position = Position {
                    topic_id: topic.id.clone(),
                    task_id: task.id.clone(),
                    kind: item.kind(),
                    id: item.id.clone(),
                };
                index.entry(position.key()).or_insert(entries.len());
                entries.push(position);
            }
            tasks.entry(task.id.clone()).or_insert(start..entries.len());
        }

        Self { entries, index, tasks }
    }

    pub fn entries(&self) -> &[Position] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Position> {
        self.entries.get(index)
    }

    /// Index of an exact (task, kind, id) triple
    pub fn index_of(&self, task_id: &str, kind: ContentKind, id: &str) -> Option<usize> {
        self.index_of_key(&ItemKey::new(task_id, kind, id))
    }

    pub fn index_of_key(&self, key: &ItemKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Entry after `index`, or `None` at the end
    pub fn next(&self, index: usize) -> Option<&Position> {
        index.checked_add(1).and_then(|i| self.entries.get(i))
    }

    /// Entry before `index`, or `None` at the start
    pub fn prev(&self, index: usize) -> Option<&Position> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Entries of one task, in order
    pub fn task_entries(&self, task_id: &str) -> &[Position] {
        match self.tasks.get(task_id) {
            Some(range) => &self.entries[range.clone()],
            None => &[],
        }
    }

    /// First entry of a task, if it has any content
    pub fn first_of_task(&self, task_id: &str) -> Option<&Position> {
        self.task_entries(task_id).first()
    }

    /// Whether the task exists in the tree the sequence was built from
    pub fn has_task(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }
}

/// Flatten a course into reading order
pub fn flatten(course: &Course) -> Sequence {
    Sequence::flatten(course)
}
