//! # DirtyTracker
//! A DirtyTracker is a wrapper around a mirrored value that adds a "dirty" flag and a "loaded" flag.
//! The dirty flag tells consumers of the mirror that derived data (rendered lists, counters) must be recomputed.
//! The loaded flag records whether the mirror has ever received a snapshot (or an error standing in for one).

use std::ops::{Deref, DerefMut};

#[derive(Clone, Debug)]
pub struct DirtyTracker<Store> {
    store: Store,
    dirty: bool,
    loaded_at_least_once: bool,
}

impl<Store: Default> Default for DirtyTracker<Store> {
    fn default() -> Self {
        Self::new(Store::default())
    }
}

/// Smart pointer that marks the store as dirty when dereferenced mutably
pub struct DirtyOnDerefMut<'a, Store> {
    store: &'a mut Store,
    dirty: &'a mut bool,
}

impl<Store> Deref for DirtyOnDerefMut<'_, Store> {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

impl<Store> DerefMut for DirtyOnDerefMut<'_, Store> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        *self.dirty = true;
        self.store
    }
}

impl<Store> DirtyTracker<Store> {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            // Creating a mirror is an action that warrants a notification.
            dirty: true,
            loaded_at_least_once: false,
        }
    }

    /// Returns true if the `loaded` marker was changed
    pub fn mark_loaded(&mut self) -> bool {
        if self.loaded_at_least_once {
            return false;
        }
        self.loaded_at_least_once = true;
        self.dirty = true;
        true
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> DirtyOnDerefMut<'_, Store> {
        DirtyOnDerefMut {
            store: &mut self.store,
            dirty: &mut self.dirty,
        }
    }

    pub fn loaded_at_least_once(&self) -> bool {
        self.loaded_at_least_once
    }

    /// Resets the flag to clean, returning whether it was dirty.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
