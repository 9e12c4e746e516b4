//! Typed record loader for key-value encoded wallet metadata stores.
//!
//! The `db` module reads an ordered stream of raw key/value records,
//! reconstructs typed wallet records and classifies every failure into a
//! closed, severity-ordered taxonomy. `wallet` layers lifecycle
//! orchestration (create, load, unload) on top and `rpc` exposes those
//! operations behind stable JSON-RPC error codes. The `kv` engine is a
//! deliberately small collaborator: the loader only ever sees the record
//! stream, never the container format.

pub mod db;
pub mod descriptor;
pub mod diag;
pub mod kv;
pub mod rpc;
pub mod wallet;

pub use db::load::{DbErrorKind, LoadContext, LoadOutcome};
pub use wallet::{Wallet, WalletError, WalletManager};
