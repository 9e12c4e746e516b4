pub mod codec;
pub mod load;
pub mod schema;
pub mod source;

pub use codec::{
    BestBlockRecord, DescriptorCacheRecord, DescriptorRecord, KeyRecord, RecordTag, TxRecord,
};
pub use load::{load_wallet, DbErrorKind, LoadContext, LoadOutcome, LoadedWallet};
pub use source::{KvRecordSource, RawRecord, RecordSource, SourceError};
