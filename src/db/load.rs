//! Load coordinator for the wallet metadata store.
//!
//! Streams raw records from a [`RecordSource`], dispatches each record to
//! the handler for its type tag, merges successes into a [`WalletState`]
//! and aggregates failures into a severity-classified [`LoadOutcome`].
//! Handlers never raise; they report a [`LoadFailure`] and this module is
//! the sole place that maps failure reasons to [`DbErrorKind`] and decides
//! whether streaming continues.

use std::fmt;

use tracing::{debug, warn};

use crate::db::codec::{self, DecodedKey, RecordTag};
use crate::db::schema;
use crate::db::source::RecordSource;
use crate::descriptor;
use crate::diag::DiagnosticSink;
use crate::wallet::{LoadedDescriptor, WalletState};

/// Classified wallet database error kinds, ordered least to most severe.
///
/// Aggregation across a load is monotonic: once a kind is recorded, a
/// later less-severe observation never downgrades the aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DbErrorKind {
    LoadOk,
    NoncriticalError,
    Corrupt,
    TooNew,
    ExternalSignerSupportRequired,
    UnknownDescriptor,
    NeedRewrite,
    NeedRescan,
}

impl DbErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DbErrorKind::LoadOk => "load_ok",
            DbErrorKind::NoncriticalError => "noncritical_error",
            DbErrorKind::Corrupt => "corrupt",
            DbErrorKind::TooNew => "too_new",
            DbErrorKind::ExternalSignerSupportRequired => "external_signer_support_required",
            DbErrorKind::UnknownDescriptor => "unknown_descriptor",
            DbErrorKind::NeedRewrite => "need_rewrite",
            DbErrorKind::NeedRescan => "need_rescan",
        }
    }

    /// Kinds at this severity abort the record stream.
    pub fn is_fatal(self) -> bool {
        self >= DbErrorKind::Corrupt
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reason reported by a record handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadFailure {
    /// Value bytes undecodable under a known tag.
    UnreadableRecord { tag: RecordTag, detail: String },
    /// Descriptor string rejected by the descriptor grammar.
    UnrecognizedDescriptor,
    /// Descriptor record format version newer than this client understands.
    UnsupportedDescriptorVersion { version: u32 },
    /// Wallet demands a newer client version.
    FutureWalletVersion { stored: u32, supported: u32 },
    /// Wallet flags demand external signer support the loader lacks.
    ExternalSignerRequired,
    /// Record uses the retired pre-v1 encoding.
    LegacyEncoding { stored: u32 },
    /// Transaction cache entry lost its payload.
    StaleTransactionIndex { txid: String },
    /// Malformed non-essential record; the load continues.
    NoncriticalRecord { tag: RecordTag, detail: String },
    /// The raw record source failed mid-stream.
    SourceFault { detail: String },
}

/// Map a handler failure reason to its classified error kind.
pub fn classify(failure: &LoadFailure) -> DbErrorKind {
    match failure {
        LoadFailure::UnreadableRecord { .. }
        | LoadFailure::UnrecognizedDescriptor
        | LoadFailure::SourceFault { .. } => DbErrorKind::Corrupt,
        LoadFailure::UnsupportedDescriptorVersion { .. } => DbErrorKind::UnknownDescriptor,
        LoadFailure::FutureWalletVersion { .. } => DbErrorKind::TooNew,
        LoadFailure::ExternalSignerRequired => DbErrorKind::ExternalSignerSupportRequired,
        LoadFailure::LegacyEncoding { .. } => DbErrorKind::NeedRewrite,
        LoadFailure::StaleTransactionIndex { .. } => DbErrorKind::NeedRescan,
        LoadFailure::NoncriticalRecord { .. } => DbErrorKind::NoncriticalError,
    }
}

fn diagnostic(failure: &LoadFailure, wallet_name: &str) -> String {
    match failure {
        LoadFailure::UnrecognizedDescriptor => {
            format!("Unrecognized descriptor found in wallet {wallet_name}")
        }
        LoadFailure::UnreadableRecord { tag, detail } => format!(
            "Failed to read {} record in wallet {wallet_name}: {detail}",
            tag.as_str()
        ),
        LoadFailure::UnsupportedDescriptorVersion { version } => {
            format!("Descriptor version {version} in wallet {wallet_name} is not supported")
        }
        LoadFailure::FutureWalletVersion { stored, supported } => format!(
            "Wallet {wallet_name} requires client version {stored}, this client supports up to {supported}"
        ),
        LoadFailure::ExternalSignerRequired => {
            format!("Wallet {wallet_name} requires external signer support")
        }
        LoadFailure::LegacyEncoding { stored } => format!(
            "Wallet {wallet_name} uses retired encoding version {stored} and must be rewritten"
        ),
        LoadFailure::StaleTransactionIndex { txid } => {
            format!("Transaction {txid} in wallet {wallet_name} lost its cached payload")
        }
        LoadFailure::NoncriticalRecord { tag, detail } => format!(
            "Skipping unreadable {} record in wallet {wallet_name}: {detail}",
            tag.as_str()
        ),
        LoadFailure::SourceFault { detail } => {
            format!("Failed to read database records of wallet {wallet_name}: {detail}")
        }
    }
}

/// One classified failure collected during a load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedFailure {
    pub kind: DbErrorKind,
    pub reason: LoadFailure,
    pub diagnostic: String,
}

/// Aggregated result of attempting to read every record of a wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOutcome {
    kind: DbErrorKind,
    failures: Vec<ClassifiedFailure>,
    pub records_loaded: usize,
    pub records_unknown: usize,
}

impl LoadOutcome {
    fn new() -> Self {
        Self {
            kind: DbErrorKind::LoadOk,
            failures: Vec::new(),
            records_loaded: 0,
            records_unknown: 0,
        }
    }

    /// Highest-severity kind observed, `LoadOk` when no record failed.
    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }

    pub fn is_ok(&self) -> bool {
        self.kind == DbErrorKind::LoadOk
    }

    /// Whether the wallet is usable despite collected failures.
    pub fn is_usable(&self) -> bool {
        self.kind <= DbErrorKind::NoncriticalError
    }

    /// Every classified failure in stream order.
    pub fn failures(&self) -> &[ClassifiedFailure] {
        &self.failures
    }

    /// The first failure carrying the aggregate severity.
    pub fn dominant(&self) -> Option<&ClassifiedFailure> {
        self.failures.iter().find(|failure| failure.kind == self.kind)
    }

    fn record(&mut self, failure: LoadFailure, wallet_name: &str) -> DbErrorKind {
        let kind = classify(&failure);
        self.kind = self.kind.max(kind);
        self.failures.push(ClassifiedFailure {
            kind,
            diagnostic: diagnostic(&failure, wallet_name),
            reason: failure,
        });
        kind
    }
}

/// Context the loader needs about the wallet and the running client.
#[derive(Clone, Debug)]
pub struct LoadContext<'a> {
    pub wallet_name: &'a str,
    pub client_version: u32,
    pub external_signer_support: bool,
}

impl<'a> LoadContext<'a> {
    pub fn new(wallet_name: &'a str) -> Self {
        Self {
            wallet_name,
            client_version: schema::CLIENT_VERSION,
            external_signer_support: false,
        }
    }

    pub fn with_client_version(mut self, version: u32) -> Self {
        self.client_version = version;
        self
    }

    pub fn with_external_signer_support(mut self, enabled: bool) -> Self {
        self.external_signer_support = enabled;
        self
    }
}

/// Result of a load: reconstructed state plus the classified outcome.
/// Callers must discard the state unless the outcome reports a usable
/// wallet.
#[derive(Debug)]
pub struct LoadedWallet {
    pub state: WalletState,
    pub outcome: LoadOutcome,
}

/// Stream every record from `source` and reconstruct the wallet state.
///
/// Records are dispatched strictly in stream order. Unknown type tags are
/// tolerated. A failure at severity [`DbErrorKind::Corrupt`] or above
/// aborts the stream; noncritical failures are collected and streaming
/// continues. Before returning, one diagnostic line per collected failure
/// is written to `sink`, so the log is complete even when the caller
/// bails on the returned outcome immediately.
pub fn load_wallet(
    source: &mut dyn RecordSource,
    ctx: &LoadContext<'_>,
    sink: &dyn DiagnosticSink,
) -> LoadedWallet {
    debug!(wallet = ctx.wallet_name, "loading wallet records");
    let mut state = WalletState::default();
    let mut outcome = LoadOutcome::new();

    loop {
        let record = match source.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(err) => {
                outcome.record(
                    LoadFailure::SourceFault {
                        detail: err.to_string(),
                    },
                    ctx.wallet_name,
                );
                break;
            }
        };
        let decoded = codec::decode_record_key(&record.key);
        if decoded.tag == RecordTag::Unknown {
            outcome.records_unknown += 1;
            debug!(
                wallet = ctx.wallet_name,
                key = %hex::encode(&record.key),
                "skipping record with unknown type tag"
            );
            continue;
        }
        match dispatch(decoded, &record.value, &mut state, ctx) {
            Ok(()) => outcome.records_loaded += 1,
            Err(failure) => {
                let kind = outcome.record(failure, ctx.wallet_name);
                if kind.is_fatal() {
                    break;
                }
            }
        }
    }

    finalize(&outcome, ctx, sink);
    LoadedWallet { state, outcome }
}

fn finalize(outcome: &LoadOutcome, ctx: &LoadContext<'_>, sink: &dyn DiagnosticSink) {
    for failure in outcome.failures() {
        sink.append(&format!("Error: {}", failure.diagnostic));
    }
    if outcome.is_ok() {
        debug!(
            wallet = ctx.wallet_name,
            records = outcome.records_loaded,
            unknown = outcome.records_unknown,
            "wallet records loaded"
        );
    } else {
        warn!(
            wallet = ctx.wallet_name,
            kind = outcome.kind().as_str(),
            failures = outcome.failures().len(),
            "wallet load finished with errors"
        );
    }
}

fn dispatch(
    key: DecodedKey<'_>,
    value: &[u8],
    state: &mut WalletState,
    ctx: &LoadContext<'_>,
) -> Result<(), LoadFailure> {
    match key.tag {
        RecordTag::Name => load_name(key.payload, value, state),
        RecordTag::Key => load_key(key.payload, value, state),
        RecordTag::Tx => load_tx(key.payload, value, state),
        RecordTag::BestBlock => load_best_block(value, state),
        RecordTag::MinVersion => load_min_version(value, state, ctx),
        RecordTag::Flags => load_flags(value, state, ctx),
        RecordTag::Descriptor => load_descriptor(key.payload, value, state),
        RecordTag::DescriptorCache => load_descriptor_cache(key.payload, value, state),
        // Skipped by the coordinator before dispatch.
        RecordTag::Unknown => Ok(()),
    }
}

fn load_name(payload: &[u8], value: &[u8], state: &mut WalletState) -> Result<(), LoadFailure> {
    let address = std::str::from_utf8(payload).map_err(|err| LoadFailure::NoncriticalRecord {
        tag: RecordTag::Name,
        detail: format!("address is not valid utf-8: {err}"),
    })?;
    let label = codec::decode_name(value).map_err(|err| LoadFailure::NoncriticalRecord {
        tag: RecordTag::Name,
        detail: err.to_string(),
    })?;
    state.names.insert(address.to_string(), label);
    Ok(())
}

fn load_key(payload: &[u8], value: &[u8], state: &mut WalletState) -> Result<(), LoadFailure> {
    if payload.is_empty() {
        return Err(LoadFailure::UnreadableRecord {
            tag: RecordTag::Key,
            detail: "missing public key in record key".to_string(),
        });
    }
    let record = codec::decode_key_record(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::Key,
        detail: err.to_string(),
    })?;
    if record.secret.len() != 32 {
        return Err(LoadFailure::UnreadableRecord {
            tag: RecordTag::Key,
            detail: format!("secret material must be 32 bytes, got {}", record.secret.len()),
        });
    }
    state.keys.insert(payload.to_vec(), record);
    Ok(())
}

fn load_tx(payload: &[u8], value: &[u8], state: &mut WalletState) -> Result<(), LoadFailure> {
    if payload.len() != 32 {
        return Err(LoadFailure::UnreadableRecord {
            tag: RecordTag::Tx,
            detail: format!("txid key payload must be 32 bytes, got {}", payload.len()),
        });
    }
    let record = codec::decode_tx(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::Tx,
        detail: err.to_string(),
    })?;
    if record.payload.is_empty() && record.height > 0 {
        return Err(LoadFailure::StaleTransactionIndex {
            txid: hex::encode(payload),
        });
    }
    state.txs.insert(payload.to_vec(), record);
    Ok(())
}

fn load_best_block(value: &[u8], state: &mut WalletState) -> Result<(), LoadFailure> {
    let record = codec::decode_best_block(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::BestBlock,
        detail: err.to_string(),
    })?;
    state.best_block = Some(record);
    Ok(())
}

fn load_min_version(
    value: &[u8],
    state: &mut WalletState,
    ctx: &LoadContext<'_>,
) -> Result<(), LoadFailure> {
    let version = codec::decode_min_version(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::MinVersion,
        detail: err.to_string(),
    })?;
    if version > ctx.client_version {
        return Err(LoadFailure::FutureWalletVersion {
            stored: version,
            supported: ctx.client_version,
        });
    }
    if version < schema::MIN_SUPPORTED_VERSION {
        return Err(LoadFailure::LegacyEncoding { stored: version });
    }
    state.min_version = Some(version);
    Ok(())
}

fn load_flags(
    value: &[u8],
    state: &mut WalletState,
    ctx: &LoadContext<'_>,
) -> Result<(), LoadFailure> {
    let flags = codec::decode_flags(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::Flags,
        detail: err.to_string(),
    })?;
    let unknown = flags & !schema::KNOWN_FLAGS;
    if unknown != 0 {
        return Err(LoadFailure::UnreadableRecord {
            tag: RecordTag::Flags,
            detail: format!("unknown wallet flags {unknown:#x}"),
        });
    }
    if flags & schema::FLAG_EXTERNAL_SIGNER != 0 && !ctx.external_signer_support {
        return Err(LoadFailure::ExternalSignerRequired);
    }
    state.flags = Some(flags);
    Ok(())
}

fn load_descriptor(
    payload: &[u8],
    value: &[u8],
    state: &mut WalletState,
) -> Result<(), LoadFailure> {
    let record = codec::decode_descriptor(value).map_err(|err| LoadFailure::UnreadableRecord {
        tag: RecordTag::Descriptor,
        detail: err.to_string(),
    })?;
    // Grammar acceptance decides recognizability; version skew is checked
    // only for descriptors that are structurally sound.
    let Ok(parsed) = descriptor::parse(&record.descriptor) else {
        return Err(LoadFailure::UnrecognizedDescriptor);
    };
    if record.version > schema::DESCRIPTOR_VERSION_LATEST {
        return Err(LoadFailure::UnsupportedDescriptorVersion {
            version: record.version,
        });
    }
    state
        .descriptors
        .insert(payload.to_vec(), LoadedDescriptor { record, parsed });
    Ok(())
}

fn load_descriptor_cache(
    payload: &[u8],
    value: &[u8],
    state: &mut WalletState,
) -> Result<(), LoadFailure> {
    let record =
        codec::decode_descriptor_cache(value).map_err(|err| LoadFailure::NoncriticalRecord {
            tag: RecordTag::DescriptorCache,
            detail: err.to_string(),
        })?;
    for entry in &record.entries {
        if entry.pubkey.len() != 33 && entry.pubkey.len() != 65 {
            return Err(LoadFailure::NoncriticalRecord {
                tag: RecordTag::DescriptorCache,
                detail: format!(
                    "cached public key at index {} has invalid length {}",
                    entry.index,
                    entry.pubkey.len()
                ),
            });
        }
    }
    state.descriptor_caches.insert(payload.to_vec(), record);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_bytes::ByteBuf;

    use super::*;
    use crate::db::codec::{
        encode_best_block, encode_descriptor, encode_descriptor_cache, encode_flags,
        encode_key_record, encode_min_version, encode_name, encode_tx, record_key,
        BestBlockRecord, DerivedKeyCacheEntry, DescriptorCacheRecord, DescriptorRecord, KeyRecord,
        TxRecord,
    };
    use crate::db::source::{RawRecord, RecordSource, SourceError};
    use crate::diag::MemorySink;

    struct VecSource {
        records: Vec<RawRecord>,
        next: usize,
    }

    impl VecSource {
        fn new(records: Vec<RawRecord>) -> Self {
            Self { records, next: 0 }
        }

        fn remaining(&self) -> usize {
            self.records.len() - self.next
        }
    }

    impl RecordSource for VecSource {
        fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
            let record = self.records.get(self.next).cloned();
            if record.is_some() {
                self.next += 1;
            }
            Ok(record)
        }
    }

    struct FailingSource {
        prefix: VecSource,
        failed: bool,
    }

    impl RecordSource for FailingSource {
        fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
            if self.prefix.remaining() > 0 {
                return self.prefix.next_record();
            }
            self.failed = true;
            Err(SourceError::Interrupted("unexpected end of file".to_string()))
        }
    }

    fn raw(key: Vec<u8>, value: Vec<u8>) -> RawRecord {
        RawRecord { key, value }
    }

    fn descriptor_record(descriptor: &str, version: u32) -> Vec<u8> {
        encode_descriptor(&DescriptorRecord {
            descriptor: descriptor.to_string(),
            creation_time: 1_700_000_000,
            next_index: 0,
            version,
            cache: Vec::new(),
        })
        .expect("encode descriptor")
    }

    fn valid_records() -> Vec<RawRecord> {
        vec![
            raw(
                record_key(schema::MINVERSION, b""),
                encode_min_version(schema::CLIENT_VERSION).expect("minversion"),
            ),
            raw(record_key(schema::FLAGS, b""), encode_flags(0).expect("flags")),
            raw(
                record_key(schema::BESTBLOCK, b""),
                encode_best_block(&BestBlockRecord {
                    height: 128,
                    hash: [7u8; 32],
                })
                .expect("bestblock"),
            ),
            raw(
                record_key(schema::NAME, b"addr1"),
                encode_name("savings").expect("name"),
            ),
            raw(
                record_key(schema::KEY, &[2u8; 33]),
                encode_key_record(&KeyRecord {
                    secret: ByteBuf::from(vec![1u8; 32]),
                    creation_time: 9,
                })
                .expect("key"),
            ),
            raw(
                record_key(schema::TX, &[3u8; 32]),
                encode_tx(&TxRecord {
                    payload: ByteBuf::from(vec![0xab, 0xcd]),
                    height: 99,
                    timestamp: 1_700_000_100,
                })
                .expect("tx"),
            ),
            raw(
                record_key(schema::WALLETDESCRIPTOR, b"d-0"),
                descriptor_record("wpkh([d34db33f/84h/0h/0h]xpubAA11/0/*)", 1),
            ),
            raw(
                record_key(schema::WALLETDESCRIPTORCACHE, b"d-0"),
                encode_descriptor_cache(&DescriptorCacheRecord {
                    entries: vec![DerivedKeyCacheEntry {
                        index: 0,
                        pubkey: ByteBuf::from(vec![2u8; 33]),
                    }],
                })
                .expect("descriptor cache"),
            ),
        ]
    }

    #[test]
    fn unknown_tags_only_is_load_ok() {
        let records = vec![
            raw(record_key("futurerecord", b"x"), b"opaque".to_vec()),
            raw(vec![0xff, 0xff], b"garbage".to_vec()),
            raw(Vec::new(), Vec::new()),
        ];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("fwd_compat"), &sink);
        assert!(loaded.outcome.is_ok());
        assert_eq!(loaded.outcome.records_unknown, 3);
        assert_eq!(loaded.outcome.records_loaded, 0);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn zeroed_descriptor_value_is_corrupt() {
        let records = vec![raw(
            record_key(schema::WALLETDESCRIPTOR, b"d-0"),
            vec![0u8; 100],
        )];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("corrupt_case"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::Corrupt);
        let dominant = loaded.outcome.dominant().expect("dominant failure");
        assert_eq!(dominant.reason, LoadFailure::UnrecognizedDescriptor);
        assert_eq!(
            sink.lines(),
            vec!["Error: Unrecognized descriptor found in wallet corrupt_case".to_string()]
        );
        assert!(loaded.state.descriptors.is_empty());
    }

    #[test]
    fn severity_is_monotonic_across_record_order() {
        let records = vec![
            // Undecodable name value: noncritical, streaming continues.
            raw(record_key(schema::NAME, b"addr1"), vec![0xff]),
            raw(
                record_key(schema::WALLETDESCRIPTOR, b"d-0"),
                vec![0u8; 100],
            ),
        ];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("monotonic"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::Corrupt);
        assert_eq!(loaded.outcome.failures().len(), 2);
        assert_eq!(loaded.outcome.failures()[0].kind, DbErrorKind::NoncriticalError);
        assert_eq!(sink.lines().len(), 2);
    }

    #[test]
    fn corrupt_record_aborts_streaming() {
        let mut records = vec![raw(
            record_key(schema::WALLETDESCRIPTOR, b"d-0"),
            vec![0u8; 100],
        )];
        records.extend(valid_records());
        let total = records.len();
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("abort"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::Corrupt);
        assert_eq!(source.remaining(), total - 1);
        assert_eq!(loaded.outcome.records_loaded, 0);
    }

    #[test]
    fn source_fault_aborts_immediately() {
        let mut source = FailingSource {
            prefix: VecSource::new(vec![raw(
                record_key(schema::NAME, b"addr1"),
                encode_name("savings").expect("name"),
            )]),
            failed: false,
        };
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("io_fault"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::Corrupt);
        assert!(source.failed);
        assert_eq!(loaded.outcome.records_loaded, 1);
        assert!(sink.contains("Failed to read database records of wallet io_fault"));
    }

    #[test]
    fn future_wallet_version_is_too_new() {
        let records = vec![raw(
            record_key(schema::MINVERSION, b""),
            encode_min_version(schema::CLIENT_VERSION + 1).expect("minversion"),
        )];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("too_new"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::TooNew);
    }

    #[test]
    fn retired_encoding_version_needs_rewrite() {
        let records = vec![raw(
            record_key(schema::MINVERSION, b""),
            encode_min_version(0).expect("minversion"),
        )];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("legacy"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::NeedRewrite);
    }

    #[test]
    fn external_signer_flag_requires_support() {
        let records = vec![raw(
            record_key(schema::FLAGS, b""),
            encode_flags(schema::FLAG_EXTERNAL_SIGNER).expect("flags"),
        )];
        let sink = MemorySink::new();

        let mut source = VecSource::new(records.clone());
        let loaded = load_wallet(&mut source, &LoadContext::new("signer"), &sink);
        assert_eq!(
            loaded.outcome.kind(),
            DbErrorKind::ExternalSignerSupportRequired
        );

        let mut source = VecSource::new(records);
        let ctx = LoadContext::new("signer").with_external_signer_support(true);
        let loaded = load_wallet(&mut source, &ctx, &sink);
        assert!(loaded.outcome.is_ok());
        assert_eq!(loaded.state.flags, Some(schema::FLAG_EXTERNAL_SIGNER));
    }

    #[test]
    fn unsupported_descriptor_version_is_unknown_descriptor() {
        let records = vec![raw(
            record_key(schema::WALLETDESCRIPTOR, b"d-0"),
            descriptor_record(
                "wpkh(abcdef)",
                schema::DESCRIPTOR_VERSION_LATEST + 1,
            ),
        )];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("future_desc"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::UnknownDescriptor);
    }

    #[test]
    fn pruned_tx_payload_needs_rescan() {
        let records = vec![raw(
            record_key(schema::TX, &[9u8; 32]),
            encode_tx(&TxRecord {
                payload: ByteBuf::new(),
                height: 42,
                timestamp: 0,
            })
            .expect("tx"),
        )];
        let mut source = VecSource::new(records);
        let sink = MemorySink::new();
        let loaded = load_wallet(&mut source, &LoadContext::new("stale_tx"), &sink);
        assert_eq!(loaded.outcome.kind(), DbErrorKind::NeedRescan);
    }

    #[test]
    fn reload_of_clean_stream_is_idempotent() {
        let sink = MemorySink::new();
        let ctx = LoadContext::new("idempotent");

        let mut first_source = VecSource::new(valid_records());
        let first = load_wallet(&mut first_source, &ctx, &sink);
        let mut second_source = VecSource::new(valid_records());
        let second = load_wallet(&mut second_source, &ctx, &sink);

        assert!(first.outcome.is_ok());
        assert_eq!(first.outcome.records_loaded, valid_records().len());
        assert_eq!(first.state, second.state);
        assert!(sink.lines().is_empty());
    }
}
