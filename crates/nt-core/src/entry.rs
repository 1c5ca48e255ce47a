//! Entry tree model.
//!
//! A tracker's entries form a forest: every node is either a leaf that owns
//! its own `[start_time, end_time)` interval, or an internal node whose time
//! is the sum of its children. Nodes live in an arena ([`EntryForest`]) and
//! are addressed by [`EntryId`]. Ids are never reused, so an id held across a
//! removal resolves to nothing instead of to a different entry.
//!
//! # Invariants
//!
//! - A node created by [`EntryForest::start_sub_entry`] gives up its own
//!   interval to a `Part 1` child and never carries one again while split.
//! - At most one leaf is running (no end time) if callers only start entries
//!   while nothing is running.
//! - Removing a child that leaves its parent with a single child folds that
//!   child back into the parent (merge-collapse).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from entry tree mutations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    /// Stopping was requested but no leaf is running.
    #[error("no running entry")]
    NoRunningEntry,
    /// Starting was requested while an entry is running.
    #[error("an entry is already running")]
    AlreadyRunning,
    /// The id does not resolve to a live entry.
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),
    /// The operation needs a leaf but the entry has sub-entries.
    #[error("entry {0} has sub-entries")]
    NotALeaf(EntryId),
    /// No entry sits at the requested position.
    #[error("no entry at the given position")]
    PathNotFound,
}

/// Stable handle to an entry inside an [`EntryForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Serialized shape of an entry inside a tracker block.
///
/// Missing fields and explicit `null`s both decode as absent. Absent times
/// and sub-entries serialize as `null`, matching what existing notes contain.
/// Keys this crate does not know are kept in `extra` and written back as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub sub_entries: Option<Vec<EntryRecord>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntryRecord {
    /// A leaf record with the given interval.
    pub fn leaf(name: impl Into<String>, start_time: i64, end_time: Option<i64>) -> Self {
        Self {
            name: name.into(),
            start_time: Some(start_time),
            end_time,
            sub_entries: None,
            extra: Map::new(),
        }
    }
}

/// One node of the entry tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// Unknown keys carried over from the stored record.
    pub extra: Map<String, Value>,
    parent: Option<EntryId>,
    children: Option<Vec<EntryId>>,
}

impl Entry {
    fn leaf(
        name: String,
        start_time: Option<i64>,
        end_time: Option<i64>,
        parent: Option<EntryId>,
    ) -> Self {
        Self {
            name,
            start_time,
            end_time,
            extra: Map::new(),
            parent,
            children: None,
        }
    }

    pub const fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// Child ids in display order; empty for leaves.
    pub fn children(&self) -> &[EntryId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// A leaf without an end time is accumulating duration.
    pub const fn is_running(&self) -> bool {
        self.is_leaf() && self.end_time.is_none()
    }
}

/// Arena-backed forest of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<EntryRecord>", into = "Vec<EntryRecord>")]
pub struct EntryForest {
    slots: Vec<Option<Entry>>,
    roots: Vec<EntryId>,
}

impl EntryForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root entry ids in insertion order.
    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    /// Number of root entries.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn alloc(&mut self, entry: Entry) -> EntryId {
        let id = EntryId(self.slots.len());
        self.slots.push(Some(entry));
        id
    }

    /// Appends a new root leaf.
    pub fn push_root(
        &mut self,
        name: impl Into<String>,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> EntryId {
        let id = self.alloc(Entry::leaf(name.into(), start_time, end_time, None));
        self.roots.push(id);
        id
    }

    /// Pre-order traversal of every live entry with its depth (roots are 0).
    pub fn walk(&self) -> Vec<(EntryId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(EntryId, usize)> = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(entry) = self.get(id) else {
                continue;
            };
            out.push((id, depth));
            stack.extend(entry.children().iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }

    /// Leaf ids in pre-order.
    pub fn leaves(&self) -> Vec<EntryId> {
        self.walk()
            .into_iter()
            .map(|(id, _)| id)
            .filter(|&id| self.get(id).is_some_and(Entry::is_leaf))
            .collect()
    }

    /// First running leaf in pre-order, first root to last.
    pub fn running_entry(&self) -> Option<EntryId> {
        self.walk()
            .into_iter()
            .map(|(id, _)| id)
            .find(|&id| self.get(id).is_some_and(Entry::is_running))
    }

    /// Stamps the running leaf with `now`.
    pub fn end_running(&mut self, now: i64) -> Result<EntryId, TrackerError> {
        let id = self.running_entry().ok_or(TrackerError::NoRunningEntry)?;
        if let Some(entry) = self.get_mut(id) {
            entry.end_time = Some(now);
        }
        Ok(id)
    }

    /// Splits `id` (if it is still a leaf) and appends a running child.
    ///
    /// A leaf first moves its own interval into a `Part 1` child. The new
    /// child is named `name`, or `Part {n}` when `name` is empty.
    pub fn start_sub_entry(
        &mut self,
        id: EntryId,
        name: &str,
        now: i64,
    ) -> Result<EntryId, TrackerError> {
        let entry = self.get_mut(id).ok_or(TrackerError::UnknownEntry(id))?;
        if entry.children.is_none() {
            let start_time = entry.start_time.take();
            let end_time = entry.end_time.take();
            let part = self.alloc(Entry::leaf("Part 1".to_string(), start_time, end_time, Some(id)));
            if let Some(entry) = self.get_mut(id) {
                entry.children = Some(vec![part]);
            }
        }

        let count = self.get(id).map_or(0, |entry| entry.children().len());
        let name = if name.is_empty() {
            format!("Part {}", count + 1)
        } else {
            name.to_string()
        };
        let child = self.alloc(Entry::leaf(name, Some(now), None, Some(id)));
        if let Some(children) = self.get_mut(id).and_then(|entry| entry.children.as_mut()) {
            children.push(child);
        }
        Ok(child)
    }

    /// Removes `id` and its subtree. Returns `false` if `id` is not present.
    ///
    /// A parent left with one child absorbs it: the child's interval (or, if
    /// the child is itself split, its children) moves up and the child slot is
    /// freed. The parent keeps its own name and extra keys. A parent left with
    /// no children is removed as well.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let Some(parent) = self.get(id).map(Entry::parent) else {
            return false;
        };

        let siblings = match parent {
            None => Some(&mut self.roots),
            Some(parent) => self.get_mut(parent).and_then(|entry| entry.children.as_mut()),
        };
        let Some(siblings) = siblings else {
            return false;
        };
        let Some(pos) = siblings.iter().position(|&sibling| sibling == id) else {
            return false;
        };
        siblings.remove(pos);

        self.free_subtree(id);
        if let Some(parent) = parent {
            self.collapse(parent);
        }
        true
    }

    fn free_subtree(&mut self, id: EntryId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.slots.get_mut(id.0).and_then(Option::take) {
                stack.extend(entry.children.into_iter().flatten());
            }
        }
    }

    fn collapse(&mut self, parent: EntryId) {
        let remaining = self
            .get(parent)
            .map(|entry| entry.children().to_vec())
            .unwrap_or_default();
        match remaining.as_slice() {
            [] => {
                self.remove(parent);
            }
            [single] => {
                let Some(child) = self.slots.get_mut(single.0).and_then(Option::take) else {
                    return;
                };
                if let Some(grandchildren) = &child.children {
                    for &grandchild in grandchildren {
                        if let Some(entry) = self.get_mut(grandchild) {
                            entry.parent = Some(parent);
                        }
                    }
                }
                if let Some(entry) = self.get_mut(parent) {
                    entry.start_time = child.start_time;
                    entry.end_time = child.end_time;
                    entry.children = child.children;
                }
            }
            _ => {}
        }
    }

    /// Duration in seconds. Running leaves are measured up to `now`.
    pub fn duration(&self, id: EntryId, now: i64) -> i64 {
        let Some(entry) = self.get(id) else {
            return 0;
        };
        match &entry.children {
            Some(children) => children.iter().map(|&child| self.duration(child, now)).sum(),
            None => entry
                .start_time
                .map_or(0, |start| entry.end_time.unwrap_or(now) - start),
        }
    }

    /// Sum of root durations.
    pub fn total_duration(&self, now: i64) -> i64 {
        self.roots.iter().map(|&id| self.duration(id, now)).sum()
    }

    /// Renames an entry and/or moves a leaf's start time.
    pub fn edit_entry(
        &mut self,
        id: EntryId,
        name: Option<&str>,
        start_time: Option<i64>,
    ) -> Result<(), TrackerError> {
        let entry = self.get_mut(id).ok_or(TrackerError::UnknownEntry(id))?;
        if start_time.is_some() && !entry.is_leaf() {
            return Err(TrackerError::NotALeaf(id));
        }
        if let Some(name) = name {
            entry.name = name.to_string();
        }
        if start_time.is_some() {
            entry.start_time = start_time;
        }
        Ok(())
    }

    /// Resolves zero-based positions: `[1, 0]` is the first child of the
    /// second root.
    pub fn find_by_path(&self, path: &[usize]) -> Option<EntryId> {
        let (first, rest) = path.split_first()?;
        let mut id = *self.roots.get(*first)?;
        for &index in rest {
            id = *self.get(id)?.children().get(index)?;
        }
        Some(id)
    }

    /// Like [`EntryForest::find_by_path`], failing with
    /// [`TrackerError::PathNotFound`].
    pub fn resolve(&self, path: &[usize]) -> Result<EntryId, TrackerError> {
        self.find_by_path(path).ok_or(TrackerError::PathNotFound)
    }

    fn insert_record(&mut self, record: EntryRecord, parent: Option<EntryId>) -> EntryId {
        let mut entry = Entry::leaf(record.name, record.start_time, record.end_time, parent);
        entry.extra = record.extra;
        let id = self.alloc(entry);
        // An empty sub-entry list carries no time; treat the node as a leaf.
        if let Some(subs) = record.sub_entries.filter(|subs| !subs.is_empty()) {
            let children = subs
                .into_iter()
                .map(|sub| self.insert_record(sub, Some(id)))
                .collect();
            if let Some(entry) = self.get_mut(id) {
                entry.children = Some(children);
            }
        }
        id
    }

    fn to_record(&self, id: EntryId) -> Option<EntryRecord> {
        let entry = self.get(id)?;
        Some(EntryRecord {
            name: entry.name.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            sub_entries: entry
                .children
                .as_ref()
                .map(|children| children.iter().filter_map(|&c| self.to_record(c)).collect()),
            extra: entry.extra.clone(),
        })
    }

    /// The forest in its serialized shape.
    pub fn to_records(&self) -> Vec<EntryRecord> {
        self.roots.iter().filter_map(|&id| self.to_record(id)).collect()
    }
}

impl From<Vec<EntryRecord>> for EntryForest {
    fn from(records: Vec<EntryRecord>) -> Self {
        let mut forest = Self::default();
        for record in records {
            let id = forest.insert_record(record, None);
            forest.roots.push(id);
        }
        forest
    }
}

impl From<EntryForest> for Vec<EntryRecord> {
    fn from(forest: EntryForest) -> Self {
        forest.to_records()
    }
}

// Structural equality; arena layout differs after removals.
impl PartialEq for EntryForest {
    fn eq(&self, other: &Self) -> bool {
        self.to_records() == other.to_records()
    }
}

impl Eq for EntryForest {}
