use thiserror::Error;

use crate::kv::{KvError, MemoryKv};

/// One raw key/value pair read from the wallet's key-value store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Error reported by a record source while streaming records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failure in the underlying key-value engine.
    #[error("storage error: {0}")]
    Storage(#[from] KvError),
    /// The record stream broke off before reaching its end.
    #[error("record stream interrupted: {0}")]
    Interrupted(String),
}

/// Ordered stream of raw records consumed by the load coordinator.
///
/// Records must be yielded in the order the store holds them; the loader
/// dispatches strictly in stream order and never rewinds.
pub trait RecordSource {
    /// Yield the next record, `None` once the stream is exhausted.
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError>;
}

/// Record source over a committed snapshot of a [`MemoryKv`] store.
pub struct KvRecordSource {
    records: std::vec::IntoIter<RawRecord>,
}

impl KvRecordSource {
    /// Snapshot the committed state of `kv` in key order.
    pub fn new(kv: &MemoryKv) -> Self {
        let records: Vec<RawRecord> = kv
            .records()
            .map(|(key, value)| RawRecord { key, value })
            .collect();
        Self {
            records: records.into_iter(),
        }
    }
}

impl RecordSource for KvRecordSource {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        Ok(self.records.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_source_yields_records_in_key_order() {
        let mut kv = MemoryKv::new();
        kv.put(b"b".to_vec(), b"2".to_vec());
        kv.put(b"a".to_vec(), b"1".to_vec());
        kv.commit().expect("commit");

        let mut source = KvRecordSource::new(&kv);
        let first = source.next_record().expect("read").expect("record");
        assert_eq!(first.key, b"a".to_vec());
        let second = source.next_record().expect("read").expect("record");
        assert_eq!(second.key, b"b".to_vec());
        assert!(source.next_record().expect("read").is_none());
    }
}
