use std::collections::BTreeMap;

use thiserror::Error;

/// Staged mutation applied to the committed state on [`MemoryKv::commit`].
#[derive(Debug, Clone)]
enum Mutation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Error type reported by the in-memory key-value engine.
#[derive(Debug, Error)]
pub enum KvError {
    /// Attempted to commit without any staged mutations.
    #[error("no pending mutations to commit")]
    EmptyCommit,
}

/// Ordered key-value engine backing a single wallet store.
///
/// Mutations are staged with [`put`](MemoryKv::put) and
/// [`delete`](MemoryKv::delete) and become visible to readers only after
/// [`commit`](MemoryKv::commit). Reads always observe the last committed
/// state, so a reader never sees a half-applied batch.
#[derive(Debug, Default)]
pub struct MemoryKv {
    state: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: Vec<Mutation>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put mutation.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.push(Mutation::Put { key, value });
    }

    /// Stage a delete mutation.
    pub fn delete(&mut self, key: &[u8]) {
        self.pending.push(Mutation::Delete { key: key.to_vec() });
    }

    /// Fetch a committed value by key.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state.get(key).cloned()
    }

    /// Apply all staged mutations and return how many were applied.
    pub fn commit(&mut self) -> Result<usize, KvError> {
        if self.pending.is_empty() {
            return Err(KvError::EmptyCommit);
        }
        let applied = self.pending.len();
        for mutation in self.pending.drain(..) {
            match mutation {
                Mutation::Put { key, value } => {
                    self.state.insert(key, value);
                }
                Mutation::Delete { key } => {
                    self.state.remove(&key);
                }
            }
        }
        Ok(applied)
    }

    /// Iterate over the committed state for a specific key prefix.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a {
        self.state
            .range(prefix.to_vec()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Iterate over every committed entry in key order.
    pub fn records(&self) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        self.state
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Whether the committed state is empty.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
