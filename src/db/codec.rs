use bincode::Options;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use thiserror::Error;
use zeroize::Zeroize;

use crate::db::schema;

/// Error surfaced when encoding or decoding wallet record payloads fails.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Wrapper around the underlying bincode error.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Record type tag derived from the key prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Name,
    Key,
    Tx,
    BestBlock,
    MinVersion,
    Flags,
    Descriptor,
    DescriptorCache,
    /// Type name not recognized by this client. Tolerated for forward
    /// compatibility.
    Unknown,
}

impl RecordTag {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordTag::Name => schema::NAME,
            RecordTag::Key => schema::KEY,
            RecordTag::Tx => schema::TX,
            RecordTag::BestBlock => schema::BESTBLOCK,
            RecordTag::MinVersion => schema::MINVERSION,
            RecordTag::Flags => schema::FLAGS,
            RecordTag::Descriptor => schema::WALLETDESCRIPTOR,
            RecordTag::DescriptorCache => schema::WALLETDESCRIPTORCACHE,
            RecordTag::Unknown => "unknown",
        }
    }
}

/// Outcome of decoding a raw record key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedKey<'a> {
    pub tag: RecordTag,
    /// Key bytes following the type name, interpreted per record type.
    pub payload: &'a [u8],
}

/// Split a raw key into its record type tag and remaining payload.
///
/// Total over arbitrary input: truncated, empty, or over-long prefixes map
/// to [`RecordTag::Unknown`] instead of an error.
pub fn decode_record_key(key: &[u8]) -> DecodedKey<'_> {
    const UNKNOWN: DecodedKey<'static> = DecodedKey {
        tag: RecordTag::Unknown,
        payload: &[],
    };
    let Some((&len, rest)) = key.split_first() else {
        return UNKNOWN;
    };
    let len = len as usize;
    if len == 0 || len > schema::MAX_TYPE_NAME_LEN || rest.len() < len {
        return UNKNOWN;
    }
    let (name, payload) = rest.split_at(len);
    let tag = if name == schema::NAME.as_bytes() {
        RecordTag::Name
    } else if name == schema::KEY.as_bytes() {
        RecordTag::Key
    } else if name == schema::TX.as_bytes() {
        RecordTag::Tx
    } else if name == schema::BESTBLOCK.as_bytes() {
        RecordTag::BestBlock
    } else if name == schema::MINVERSION.as_bytes() {
        RecordTag::MinVersion
    } else if name == schema::FLAGS.as_bytes() {
        RecordTag::Flags
    } else if name == schema::WALLETDESCRIPTOR.as_bytes() {
        RecordTag::Descriptor
    } else if name == schema::WALLETDESCRIPTORCACHE.as_bytes() {
        RecordTag::DescriptorCache
    } else {
        return DecodedKey {
            tag: RecordTag::Unknown,
            payload: &[],
        };
    };
    DecodedKey { tag, payload }
}

/// Build a raw record key from a type name and key payload.
pub fn record_key(type_name: &str, payload: &[u8]) -> Vec<u8> {
    debug_assert!(type_name.len() <= schema::MAX_TYPE_NAME_LEN);
    let mut key = Vec::with_capacity(1 + type_name.len() + payload.len());
    key.push(type_name.len() as u8);
    key.extend_from_slice(type_name.as_bytes());
    key.extend_from_slice(payload);
    key
}

/// Private key material tracked by the wallet. Key payload of the record
/// carries the public key bytes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRecord {
    pub secret: ByteBuf,
    pub creation_time: u64,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Cached wallet transaction entry. Key payload carries the txid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxRecord {
    pub payload: ByteBuf,
    pub height: u32,
    pub timestamp: u64,
}

/// Best known block checkpoint recorded at shutdown.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BestBlockRecord {
    pub height: u32,
    pub hash: [u8; 32],
}

/// One derived public key cached for a descriptor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivedKeyCacheEntry {
    pub index: u32,
    pub pubkey: ByteBuf,
}

/// Serialized output descriptor plus bookkeeping metadata. The descriptor
/// string must be accepted by the descriptor grammar before the record is
/// merged into wallet state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorRecord {
    pub descriptor: String,
    pub creation_time: u64,
    pub next_index: u32,
    pub version: u32,
    pub cache: Vec<DerivedKeyCacheEntry>,
}

/// Derived-key cache stored separately from its descriptor record. Key
/// payload references the owning descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorCacheRecord {
    pub entries: Vec<DerivedKeyCacheEntry>,
}

pub fn encode_name(label: &str) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(label)?)
}

pub fn decode_name(bytes: &[u8]) -> Result<String, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_key_record(record: &KeyRecord) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(record)?)
}

pub fn decode_key_record(bytes: &[u8]) -> Result<KeyRecord, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_tx(record: &TxRecord) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(record)?)
}

pub fn decode_tx(bytes: &[u8]) -> Result<TxRecord, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_best_block(record: &BestBlockRecord) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(record)?)
}

pub fn decode_best_block(bytes: &[u8]) -> Result<BestBlockRecord, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_min_version(version: u32) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(&version)?)
}

pub fn decode_min_version(bytes: &[u8]) -> Result<u32, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_flags(flags: u64) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(&flags)?)
}

pub fn decode_flags(bytes: &[u8]) -> Result<u64, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_descriptor(record: &DescriptorRecord) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(record)?)
}

pub fn decode_descriptor(bytes: &[u8]) -> Result<DescriptorRecord, CodecError> {
    Ok(options().deserialize(bytes)?)
}

pub fn encode_descriptor_cache(record: &DescriptorCacheRecord) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(record)?)
}

pub fn decode_descriptor_cache(bytes: &[u8]) -> Result<DescriptorCacheRecord, CodecError> {
    Ok(options().deserialize(bytes)?)
}
