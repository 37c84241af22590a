//! Ordered in-memory collection with an id index.
//!
//! # Responsibility
//! - Keep one controller's cached rows in display order.
//! - Serve id lookups in O(1) for in-place patches.
//!
//! # Invariants
//! - `index[id]` is the position of the row with that id in `items`.
//! - The index is rebuilt after every structural change (replace, prepend, remove).
//! - In-place replacement never moves a row.

use crate::model::common::EntityId;
use crate::model::Entity;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Collection<E: Entity> {
    items: Vec<E>,
    index: HashMap<EntityId, usize>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection, keeping the given order.
    pub fn replace_all(&mut self, items: Vec<E>) {
        self.items = items;
        self.rebuild_index();
    }

    /// Inserts a row at the head.
    ///
    /// A row already cached under the same id is dropped first.
    pub fn prepend(&mut self, item: E) {
        if let Some(position) = self.index.get(&item.id()).copied() {
            self.items.remove(position);
        }
        self.items.insert(0, item);
        self.rebuild_index();
    }

    /// Swaps the cached row with the same id for `item`, keeping its position.
    ///
    /// Returns `false` when no row with that id is cached.
    pub fn replace(&mut self, item: E) -> bool {
        match self.index.get(&item.id()).copied() {
            Some(position) => {
                self.items[position] = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<E> {
        let position = self.index.get(&id).copied()?;
        let removed = self.items.remove(position);
        self.rebuild_index();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.index.get(&id).map(|position| &self.items[*position])
    }

    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, item) in self.items.iter().enumerate() {
            self.index.entry(item.id()).or_insert(position);
        }
    }
}
