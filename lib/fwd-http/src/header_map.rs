/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use indexmap::IndexMap;

/// Header fields of a head.
///
/// Names are kept as received and compared case-sensitively, a later `set`
/// of the same name replaces the value in place. Insertion order is kept so
/// that serialization is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: IndexMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn set<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.inner.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.shift_remove(name)
    }

    /// Lookup ignoring ASCII case, the first match in insertion order wins.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_ignore_case(&self, name: &str) -> bool {
        self.get_ignore_case(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
