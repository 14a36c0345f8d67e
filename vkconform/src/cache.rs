// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use foldhash::HashMap;
use parking_lot::RwLock;
use std::{borrow::Borrow, collections::hash_map::Entry, hash::Hash};

/// A map specialized to caching values that never change once computed.
///
/// Readers never block each other, except when an entry is vacant. In that case it gets written
/// to once and then never again; entries are immutable after insertion.
#[derive(Debug)]
pub(crate) struct OnceCache<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for OnceCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OnceCache<K, V> {
    /// Creates a new `OnceCache`.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::default()),
        }
    }
}

impl<K, V> OnceCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the value for the specified `key`, if it exists.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.read().get(key).cloned()
    }

    /// Returns the value for the specified `key`. The entry gets written to with the key-value
    /// pair returned by `f` if it doesn't exist. If `f` returns [`Err`], the error is
    /// propagated and the entry isn't written to.
    pub(crate) fn get_or_try_insert<Q, E>(
        &self,
        key: &Q,
        f: impl FnOnce() -> Result<(K, V), E>,
    ) -> Result<V, E>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let (key, value) = f()?;

        match self.inner.write().entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(value.clone());

                Ok(value)
            }
        }
    }
}
