//! Wallet-open orchestration on top of the record loader.
//!
//! The manager owns one key-value store per wallet name and the set of
//! currently loaded wallets. Loading streams the store through
//! [`db::load::load_wallet`](crate::db::load::load_wallet) and maps a
//! failed outcome to a stable, wallet-name-free caller message; the full
//! detail lands in the diagnostic sink only.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::codec::{
    self, BestBlockRecord, CodecError, DescriptorCacheRecord, DescriptorRecord, KeyRecord,
    TxRecord,
};
use crate::db::load::{self, DbErrorKind, LoadContext, LoadFailure, LoadOutcome};
use crate::db::schema;
use crate::db::source::KvRecordSource;
use crate::descriptor::{self, Descriptor, DescriptorError};
use crate::diag::DiagnosticSink;
use crate::kv::{KvError, MemoryKv};

/// A descriptor record together with its grammar-validated parse.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDescriptor {
    pub record: DescriptorRecord,
    pub parsed: Descriptor,
}

/// In-memory wallet state reconstructed from the metadata store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WalletState {
    pub min_version: Option<u32>,
    pub flags: Option<u64>,
    pub best_block: Option<BestBlockRecord>,
    /// Address book labels keyed by address.
    pub names: BTreeMap<String, String>,
    /// Key material keyed by public key bytes.
    pub keys: BTreeMap<Vec<u8>, KeyRecord>,
    /// Cached transactions keyed by txid bytes.
    pub txs: BTreeMap<Vec<u8>, TxRecord>,
    /// Descriptors keyed by their record key payload.
    pub descriptors: BTreeMap<Vec<u8>, LoadedDescriptor>,
    /// Derived-key caches keyed by the owning descriptor reference.
    pub descriptor_caches: BTreeMap<Vec<u8>, DescriptorCacheRecord>,
}

/// A successfully loaded wallet.
#[derive(Debug)]
pub struct Wallet {
    name: String,
    state: WalletState,
    warnings: Vec<String>,
}

impl Wallet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    /// Diagnostics collected for noncritical failures during the load.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Errors surfaced by wallet lifecycle operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Load aborted with a classified database error. The message is the
    /// stable caller-facing text and never carries the wallet name.
    #[error("{message}")]
    Load { kind: DbErrorKind, message: String },
    #[error("invalid wallet name {0:?}")]
    InvalidName(String),
    #[error("wallet {0:?} already exists")]
    AlreadyExists(String),
    #[error("wallet {0:?} is already loaded")]
    AlreadyLoaded(String),
    #[error("wallet {0:?} is not loaded")]
    NotLoaded(String),
    #[error("wallet {0:?} does not exist")]
    UnknownWallet(String),
    #[error("storage error: {0}")]
    Storage(#[from] KvError),
    #[error("serialization error: {0}")]
    Codec(#[from] CodecError),
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Manager tracking wallet stores and the wallets currently loaded.
pub struct WalletManager {
    stores: Mutex<BTreeMap<String, Arc<Mutex<MemoryKv>>>>,
    loaded: Mutex<BTreeMap<String, Arc<Wallet>>>,
    sink: Arc<dyn DiagnosticSink>,
    client_version: u32,
    external_signer_support: bool,
}

impl WalletManager {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            stores: Mutex::new(BTreeMap::new()),
            loaded: Mutex::new(BTreeMap::new()),
            sink,
            client_version: schema::CLIENT_VERSION,
            external_signer_support: false,
        }
    }

    pub fn with_external_signer_support(mut self, enabled: bool) -> Self {
        self.external_signer_support = enabled;
        self
    }

    /// Create a fresh wallet store, seed its default records and load it.
    pub fn create_wallet(&self, name: &str) -> Result<Arc<Wallet>, WalletError> {
        if name.is_empty() || name.contains(['/', '\0']) {
            return Err(WalletError::InvalidName(name.to_string()));
        }
        {
            let mut stores = lock(&self.stores);
            if stores.contains_key(name) {
                return Err(WalletError::AlreadyExists(name.to_string()));
            }
            let mut kv = MemoryKv::new();
            seed_wallet(&mut kv, name, self.client_version)?;
            stores.insert(name.to_string(), Arc::new(Mutex::new(kv)));
        }
        debug!(wallet = name, "created wallet store");
        self.load_wallet(name)
    }

    /// Load a wallet by name, reading and validating every stored record.
    pub fn load_wallet(&self, name: &str) -> Result<Arc<Wallet>, WalletError> {
        if lock(&self.loaded).contains_key(name) {
            return Err(WalletError::AlreadyLoaded(name.to_string()));
        }
        let store = lock(&self.stores)
            .get(name)
            .cloned()
            .ok_or_else(|| WalletError::UnknownWallet(name.to_string()))?;

        let ctx = LoadContext::new(name)
            .with_client_version(self.client_version)
            .with_external_signer_support(self.external_signer_support);
        let loaded = {
            // The store guard spans the whole load and is released on every
            // exit path, including the fatal-abort one.
            let guard = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut source = KvRecordSource::new(&guard);
            load::load_wallet(&mut source, &ctx, self.sink.as_ref())
        };

        if !loaded.outcome.is_usable() {
            return Err(WalletError::Load {
                kind: loaded.outcome.kind(),
                message: user_message(&loaded.outcome),
            });
        }
        let warnings: Vec<String> = loaded
            .outcome
            .failures()
            .iter()
            .map(|failure| failure.diagnostic.clone())
            .collect();
        if !warnings.is_empty() {
            warn!(
                wallet = name,
                count = warnings.len(),
                "wallet loaded with warnings"
            );
        }
        let wallet = Arc::new(Wallet {
            name: name.to_string(),
            state: loaded.state,
            warnings,
        });
        lock(&self.loaded).insert(name.to_string(), Arc::clone(&wallet));
        Ok(wallet)
    }

    /// Drop the in-memory wallet; its store stays behind for later reloads.
    pub fn unload_wallet(&self, name: &str) -> Result<(), WalletError> {
        lock(&self.loaded)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WalletError::NotLoaded(name.to_string()))
    }

    /// Names of the currently loaded wallets.
    pub fn list_wallets(&self) -> Vec<String> {
        lock(&self.loaded).keys().cloned().collect()
    }

    pub fn wallet(&self, name: &str) -> Option<Arc<Wallet>> {
        lock(&self.loaded).get(name).cloned()
    }

    /// Direct handle to a wallet's backing store, for maintenance tooling.
    pub fn store(&self, name: &str) -> Option<Arc<Mutex<MemoryKv>>> {
        lock(&self.stores).get(name).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stable caller-facing message for a failed load. Never carries the
/// wallet name; per-record detail is only in the diagnostic log.
fn user_message(outcome: &LoadOutcome) -> String {
    let detail = match outcome.dominant().map(|failure| &failure.reason) {
        Some(LoadFailure::UnrecognizedDescriptor) => "Unrecognized descriptor found.",
        _ => match outcome.kind() {
            DbErrorKind::TooNew => "Wallet requires a newer software version.",
            DbErrorKind::ExternalSignerSupportRequired => "External signer support required.",
            DbErrorKind::UnknownDescriptor => "Unsupported descriptor found.",
            DbErrorKind::NeedRewrite => "Wallet needs to be rewritten.",
            DbErrorKind::NeedRescan => "Wallet transaction cache is stale and must be rescanned.",
            _ => "Wallet corrupted.",
        },
    };
    format!("Wallet loading failed. {detail}")
}

fn seed_wallet(kv: &mut MemoryKv, name: &str, client_version: u32) -> Result<(), WalletError> {
    kv.put(
        codec::record_key(schema::MINVERSION, b""),
        codec::encode_min_version(client_version)?,
    );
    kv.put(
        codec::record_key(schema::FLAGS, b""),
        codec::encode_flags(0)?,
    );
    kv.put(
        codec::record_key(schema::BESTBLOCK, b""),
        codec::encode_best_block(&BestBlockRecord {
            height: 0,
            hash: [0u8; 32],
        })?,
    );
    for (index, change) in [(0u32, 0u32), (1, 1)] {
        let record = DescriptorRecord {
            descriptor: default_descriptor(name, change)?,
            creation_time: 0,
            next_index: 0,
            version: schema::DESCRIPTOR_VERSION_LATEST,
            cache: Vec::new(),
        };
        kv.put(
            codec::record_key(schema::WALLETDESCRIPTOR, &index.to_be_bytes()),
            codec::encode_descriptor(&record)?,
        );
        kv.put(
            codec::record_key(schema::WALLETDESCRIPTORCACHE, &index.to_be_bytes()),
            codec::encode_descriptor_cache(&DescriptorCacheRecord::default())?,
        );
    }
    kv.commit()?;
    Ok(())
}

/// Deterministic default descriptor for a fresh wallet. Real key material
/// is provisioned by the signing layer; the store only needs a
/// grammar-valid descriptor string to anchor derivation metadata.
fn default_descriptor(name: &str, change: u32) -> Result<String, DescriptorError> {
    let mut fingerprint = [0u8; 4];
    for (index, byte) in name.bytes().enumerate() {
        fingerprint[index % 4] ^= byte;
    }
    let payload = format!(
        "wpkh([{}/84h/0h/0h]xpub{}/{change}/*)",
        hex::encode(fingerprint),
        hex::encode(name.as_bytes()),
    );
    let checksum = descriptor::checksum_of(&payload)?;
    Ok(format!("{payload}#{checksum}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::MemorySink;

    fn manager() -> (Arc<MemorySink>, WalletManager) {
        let sink = Arc::new(MemorySink::new());
        let manager = WalletManager::new(Arc::clone(&sink) as Arc<dyn DiagnosticSink>);
        (sink, manager)
    }

    #[test]
    fn create_seeds_descriptors_and_versions() {
        let (_sink, manager) = manager();
        let wallet = manager.create_wallet("alpha").expect("create wallet");
        assert_eq!(wallet.name(), "alpha");
        assert_eq!(wallet.state().min_version, Some(schema::CLIENT_VERSION));
        assert_eq!(wallet.state().flags, Some(0));
        assert_eq!(wallet.state().descriptors.len(), 2);
        assert!(wallet.warnings().is_empty());
    }

    #[test]
    fn create_rejects_duplicates_and_bad_names() {
        let (_sink, manager) = manager();
        manager.create_wallet("alpha").expect("create wallet");
        manager.unload_wallet("alpha").expect("unload");
        assert!(matches!(
            manager.create_wallet("alpha"),
            Err(WalletError::AlreadyExists(_))
        ));
        assert!(matches!(
            manager.create_wallet(""),
            Err(WalletError::InvalidName(_))
        ));
    }

    #[test]
    fn lifecycle_errors_are_distinct() {
        let (_sink, manager) = manager();
        manager.create_wallet("alpha").expect("create wallet");
        assert!(matches!(
            manager.load_wallet("alpha"),
            Err(WalletError::AlreadyLoaded(_))
        ));
        assert!(matches!(
            manager.load_wallet("missing"),
            Err(WalletError::UnknownWallet(_))
        ));
        assert!(matches!(
            manager.unload_wallet("missing"),
            Err(WalletError::NotLoaded(_))
        ));
    }

    #[test]
    fn reload_reproduces_identical_state() {
        let (sink, manager) = manager();
        let created = manager.create_wallet("alpha").expect("create wallet");
        let before = created.state().clone();
        manager.unload_wallet("alpha").expect("unload");
        let reloaded = manager.load_wallet("alpha").expect("reload");
        assert_eq!(reloaded.state(), &before);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn corrupted_descriptor_surfaces_fixed_message_and_logs_name() {
        let (sink, manager) = manager();
        manager.create_wallet("beta").expect("create wallet");
        manager.unload_wallet("beta").expect("unload");

        let store = manager.store("beta").expect("store handle");
        {
            let mut kv = store.lock().expect("store lock");
            let keys: Vec<Vec<u8>> = kv
                .scan_prefix(&codec::record_key(schema::WALLETDESCRIPTOR, b""))
                .map(|(key, _)| key)
                .collect();
            assert!(!keys.is_empty());
            for key in keys {
                kv.put(key, vec![0u8; 100]);
            }
            kv.commit().expect("commit corruption");
        }

        let err = manager.load_wallet("beta").expect_err("load must fail");
        match &err {
            WalletError::Load { kind, message } => {
                assert_eq!(*kind, DbErrorKind::Corrupt);
                assert_eq!(
                    message,
                    "Wallet loading failed. Unrecognized descriptor found."
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sink.contains("Error: Unrecognized descriptor found in wallet beta"));
        assert!(manager.wallet("beta").is_none());
    }
}
