//! Atomic get-or-create table handing out stable handles.
//!
//! An [`Interner`] maps a structural key to a dense handle. The first insertion of a key
//! assigns the next handle; every later lookup of an equal key returns the same handle.
//! Handles are never reassigned, and the key behind a handle can be read back at any time.

use std::hash::Hash;

use dashmap::{mapref::entry::Entry, DashMap};

/// Concurrent structural-key interner.
///
/// # Examples
///
/// ```rust
/// use dotprobe::utils::Interner;
///
/// let table: Interner<(usize, &str)> = Interner::new();
/// let (a, fresh) = table.intern((0, "normal"));
/// assert!(fresh);
/// let (b, fresh) = table.intern((0, "normal"));
/// assert!(!fresh);
/// assert_eq!(a, b);
/// assert_eq!(table.resolve(a), Some(&(0, "normal")));
/// ```
#[derive(Debug)]
pub struct Interner<K>
where
    K: Eq + Hash + Clone,
{
    handles: DashMap<K, usize>,
    keys: boxcar::Vec<K>,
}

impl<K> Default for Interner<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Interner {
            handles: DashMap::new(),
            keys: boxcar::Vec::new(),
        }
    }
}

impl<K> Interner<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of `key`, assigning a new one on first sight.
    ///
    /// # Returns
    ///
    /// `(handle, inserted)` where `inserted` is `true` only for the call that created it.
    pub fn intern(&self, key: K) -> (usize, bool) {
        match self.handles.entry(key) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => {
                let handle = self.keys.push(entry.key().clone());
                entry.insert(handle);
                (handle, true)
            }
        }
    }

    /// Returns the handle of `key` without inserting.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<usize> {
        self.handles.get(key).map(|entry| *entry.value())
    }

    /// Returns the key behind `handle`.
    #[must_use]
    pub fn resolve(&self, handle: usize) -> Option<&K> {
        self.keys.get(handle)
    }

    /// Number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.count()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates `(handle, key)` in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> {
        self.keys.iter()
    }
}
