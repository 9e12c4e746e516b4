//! Record type names and version constants for the wallet metadata store.
//!
//! Every record key starts with a one-byte length discriminant followed by
//! the ASCII type name, e.g. hex `10` + `walletdescriptor` for descriptor
//! records. The payload after the type name is interpreted per record type.

/// Address book label for a wallet address.
pub const NAME: &str = "name";
/// Key material owned by the wallet.
pub const KEY: &str = "key";
/// Cached wallet transaction.
pub const TX: &str = "tx";
/// Best known block checkpoint at last shutdown.
pub const BESTBLOCK: &str = "bestblock";
/// Minimum client version able to read this wallet.
pub const MINVERSION: &str = "minversion";
/// Wallet feature flag bits.
pub const FLAGS: &str = "flags";
/// Serialized output descriptor plus metadata.
pub const WALLETDESCRIPTOR: &str = "walletdescriptor";
/// Derived-key cache entries for a descriptor.
pub const WALLETDESCRIPTORCACHE: &str = "walletdescriptorcache";

/// Longest type name the key decoder accepts. Anything longer is treated
/// as an unknown tag rather than scanned for.
pub const MAX_TYPE_NAME_LEN: usize = 64;

/// Version written by this client into fresh wallets.
pub const CLIENT_VERSION: u32 = 3;
/// Oldest wallet version this client can still read. Records below it use
/// the retired pre-v1 encoding and require a rewrite.
pub const MIN_SUPPORTED_VERSION: u32 = 1;

/// Newest descriptor record format version this client understands.
pub const DESCRIPTOR_VERSION_LATEST: u32 = 1;

/// Wallet was created without private keys.
pub const FLAG_DISABLE_PRIVATE_KEYS: u64 = 1 << 0;
/// Wallet was created blank (no seeded descriptors or keys).
pub const FLAG_BLANK_WALLET: u64 = 1 << 1;
/// Wallet requires an external signer for spending.
pub const FLAG_EXTERNAL_SIGNER: u64 = 1 << 2;
/// Every flag bit this client understands.
pub const KNOWN_FLAGS: u64 = FLAG_DISABLE_PRIVATE_KEYS | FLAG_BLANK_WALLET | FLAG_EXTERNAL_SIGNER;
