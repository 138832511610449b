//! Name-keyed resource storage.
//!
//! A [`Registry`] owns its resources and hands out typed [`Handle`]s. Lookups
//! by name or handle return `Option`; a missing entry is never papered over
//! with a placeholder.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use tracing::debug;

/// Index of a resource in a [`Registry<T>`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Resources stored by name.
#[derive(Debug)]
pub struct Registry<T> {
    items: Vec<T>,
    names: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            names: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item` under `name`.
    ///
    /// Reusing a name replaces the stored item in place, so handles already
    /// given out for that name now refer to the new item.
    pub fn insert(&mut self, name: impl Into<String>, item: T) -> Handle<T> {
        let name = name.into();
        if let Some(&index) = self.names.get(&name) {
            debug!("Replacing registry entry '{}'", name);
            self.items[index] = item;
            return Handle::new(index);
        }

        let index = self.items.len();
        self.items.push(item);
        self.names.insert(name, index);
        Handle::new(index)
    }

    pub fn handle(&self, name: &str) -> Option<Handle<T>> {
        self.names.get(name).map(|&index| Handle::new(index))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.handle(name).and_then(|handle| self.get(handle))
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        let handle = self.handle(name)?;
        self.get_mut(handle)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = Registry::new();
        let a = registry.insert("a", 1);
        let b = registry.insert("b", 2);

        assert_ne!(a, b);
        assert_eq!(registry.get(a), Some(&1));
        assert_eq!(registry.get_by_name("b"), Some(&2));
        assert_eq!(registry.handle("a"), Some(a));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_name_is_none() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry.get_by_name("missing").is_none());
        assert!(registry.handle("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut registry = Registry::new();
        let first = registry.insert("mesh", "old");
        let second = registry.insert("mesh", "new");
        assert_eq!(first, second);
        assert_eq!(registry.get(first), Some(&"new"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_mut() {
        let mut registry = Registry::new();
        registry.insert("x", 5);
        if let Some(value) = registry.get_by_name_mut("x") {
            *value += 1;
        }
        assert_eq!(registry.get_by_name("x"), Some(&6));
    }
}
