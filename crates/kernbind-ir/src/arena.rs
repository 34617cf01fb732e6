//! Index-based storage for functions, expressions and types.
//!
//! Everything in a [`Module`](crate::Module) refers to everything else by
//! [`Handle`]. Handle order is insertion order; for functions that is the
//! module declaration order every analysis uses as its tiebreaker.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A typed index into an [`Arena`] or a [`UniqueArena`].
pub struct Handle<T> {
    index: u32,
    marker: PhantomData<fn() -> T>,
}

// Manual impls: deriving would require `T` itself to implement each trait.
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

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            marker: PhantomData,
        }
    }

    fn from_position(position: usize) -> Self {
        match u32::try_from(position) {
            Ok(index) => Self::new(index),
            Err(_) => panic!("arena holds more than u32::MAX items"),
        }
    }

    /// Zero-based position in the owning arena.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

fn enumerate<'a, T>(items: &'a [T]) -> impl Iterator<Item = (Handle<T>, &'a T)> + 'a {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (Handle::from_position(i), item))
}

/// Handle-addressed storage.
///
/// Values are only appended, with one exception: [`Arena::remove`] takes a
/// value out and shifts every later value down by one. The module is
/// responsible for remapping handles after a removal.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stores `value` and returns its handle.
    pub fn append(&mut self, value: T) -> Handle<T> {
        let handle = Handle::from_position(self.items.len());
        self.items.push(value);
        handle
    }

    pub(crate) fn remove(&mut self, handle: Handle<T>) -> T {
        self.items.remove(handle.index())
    }

    /// Returns the value behind `handle`, or `None` if it is out of range.
    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    /// `(handle, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        enumerate(&self.items)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| (Handle::from_position(i), item))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.index()]
    }
}

/// Interning storage: equal values always get the same handle.
///
/// Types live here, so comparing two `Handle<Type>` compares the types
/// structurally. Interned values are never removed.
#[derive(Clone, Debug)]
pub struct UniqueArena<T> {
    items: Vec<T>,
    lookup: HashMap<T, Handle<T>>,
}

impl<T> Default for UniqueArena<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<T: Hash + Eq + Clone> UniqueArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Interns `value`, reusing the handle of an equal value.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(&handle) = self.lookup.get(&value) {
            return handle;
        }
        let handle = Handle::from_position(self.items.len());
        self.lookup.insert(value.clone(), handle);
        self.items.push(value);
        handle
    }

    /// Looks up the handle of an already interned value.
    pub fn get(&self, value: &T) -> Option<Handle<T>> {
        self.lookup.get(value).copied()
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        enumerate(&self.items)
    }
}

impl<T> Index<Handle<T>> for UniqueArena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}
