// SPDX-License-Identifier: MIT OR Apache-2.0

//! The associative tag stack and its snapshots.

/// One identifier and the values pushed for it, most recent last.  Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagEntry {
    id: String,
    values: Vec<String>,
}

/// Per-identifier stacks, kept in the order identifiers first became active.
///
/// Pushing an identifier that is already active shadows its value; popping restores the
/// previous one.  An identifier whose stack empties is forgotten, so pushing it again later
/// places it after the identifiers that stayed active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TagStack {
    entries: Vec<TagEntry>,
}

impl TagStack {
    pub(crate) fn push(&mut self, id: &str, value: &str) {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.values.push(value.to_string()),
            None => self.entries.push(TagEntry {
                id: id.to_string(),
                values: vec![value.to_string()],
            }),
        }
    }

    /// Pops the innermost value of `id`.  Popping an identifier that is not active does nothing.
    pub(crate) fn pop(&mut self, id: &str) -> Option<String> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let entry = &mut self.entries[index];
        let popped = entry.values.pop();
        if entry.values.is_empty() {
            self.entries.remove(index);
        }
        popped
    }

    pub(crate) fn value(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.values.last())
            .map(String::as_str)
    }

    /// The active value of every identifier, in push order of distinct identifiers.
    pub(crate) fn values(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.values.last().cloned())
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/**
An owned, immutable copy of one thread's tag stack.

Produced by [`snapshot_tags`](super::snapshot_tags) and pasted onto another thread with
[`restore_tags`](super::restore_tags).  The snapshot is independent of the thread it was
taken on: later pushes and pops there do not affect it.  Release it with
[`TagSnapshot::release`] (or simply drop it) once it has been pasted.
*/
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a snapshot does nothing until it is restored on another thread"]
pub struct TagSnapshot {
    pub(crate) stack: TagStack,
}

impl TagSnapshot {
    /// The tag values captured, in the order `current_tags` returned them.
    pub fn values(&self) -> Vec<String> {
        self.stack.values()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Releases the snapshot.
    pub fn release(self) {}
}
