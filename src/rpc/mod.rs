//! JSON-RPC facade for wallet lifecycle operations.
//!
//! Transport is out of scope; the router consumes already-decoded
//! requests and produces responses, so it can sit behind any carrier.

pub mod dto;
pub mod error;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use dto::{
    CreateWalletParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListWalletsResponse,
    LoadWalletParams, UnloadWalletParams, WalletInfoResponse,
};
use error::RpcErrorCode;

use crate::wallet::{Wallet, WalletError, WalletManager};

/// Router dispatching wallet lifecycle methods to a [`WalletManager`].
pub struct WalletRpcRouter {
    manager: Arc<WalletManager>,
}

impl WalletRpcRouter {
    pub fn new(manager: Arc<WalletManager>) -> Self {
        Self { manager }
    }

    /// Handle one decoded JSON-RPC request.
    pub fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        debug!(method = %request.method, "dispatching wallet rpc request");
        let result = match request.method.as_str() {
            "createwallet" => parse_params::<CreateWalletParams>(request.params)
                .and_then(|params| self.create_wallet(&params.wallet_name)),
            "loadwallet" => parse_params::<LoadWalletParams>(request.params)
                .and_then(|params| self.load_wallet(&params.wallet_name)),
            "unloadwallet" => parse_params::<UnloadWalletParams>(request.params)
                .and_then(|params| self.unload_wallet(&params.wallet_name)),
            "listwallets" => self.list_wallets(),
            other => Err(method_not_found(other)),
        };
        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    fn create_wallet(&self, name: &str) -> Result<Value, JsonRpcError> {
        let wallet = self.manager.create_wallet(name).map_err(wallet_error)?;
        to_result(&wallet_info(&wallet))
    }

    fn load_wallet(&self, name: &str) -> Result<Value, JsonRpcError> {
        let wallet = self.manager.load_wallet(name).map_err(wallet_error)?;
        to_result(&wallet_info(&wallet))
    }

    fn unload_wallet(&self, name: &str) -> Result<Value, JsonRpcError> {
        self.manager.unload_wallet(name).map_err(wallet_error)?;
        Ok(Value::Object(serde_json::Map::new()))
    }

    fn list_wallets(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListWalletsResponse {
            wallets: self.manager.list_wallets(),
        })
    }
}

fn wallet_info(wallet: &Wallet) -> WalletInfoResponse {
    WalletInfoResponse {
        name: wallet.name().to_string(),
        warnings: wallet.warnings().to_vec(),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|err| {
        let code = RpcErrorCode::InvalidParams;
        JsonRpcError::new(
            code.as_i32(),
            format!("invalid params: {err}"),
            Some(code.data_payload(None)),
        )
    })
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|err| {
        let code = RpcErrorCode::InternalError;
        JsonRpcError::new(code.as_i32(), err.to_string(), Some(code.data_payload(None)))
    })
}

fn method_not_found(method: &str) -> JsonRpcError {
    let code = RpcErrorCode::MethodNotFound;
    JsonRpcError::new(
        code.as_i32(),
        format!("method {method:?} not found"),
        Some(code.data_payload(None)),
    )
}

fn wallet_error(error: WalletError) -> JsonRpcError {
    let code = match &error {
        WalletError::Load { .. } | WalletError::AlreadyExists(_) => RpcErrorCode::WalletError,
        WalletError::AlreadyLoaded(_) => RpcErrorCode::WalletAlreadyLoaded,
        WalletError::UnknownWallet(_) | WalletError::NotLoaded(_) => RpcErrorCode::WalletNotFound,
        WalletError::InvalidName(_) => RpcErrorCode::InvalidParameter,
        WalletError::Storage(_) | WalletError::Codec(_) | WalletError::Descriptor(_) => {
            RpcErrorCode::InternalError
        }
    };
    JsonRpcError::new(
        code.as_i32(),
        error.to_string(),
        Some(code.data_payload(None)),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::diag::{DiagnosticSink, MemorySink};

    fn router() -> WalletRpcRouter {
        let sink = Arc::new(MemorySink::new()) as Arc<dyn DiagnosticSink>;
        WalletRpcRouter::new(Arc::new(WalletManager::new(sink)))
    }

    fn call(router: &WalletRpcRouter, method: &str, params: Value) -> JsonRpcResponse {
        router.handle(JsonRpcRequest::new(method, Some(params)))
    }

    #[test]
    fn create_list_unload_roundtrip() {
        let router = router();
        let response = call(&router, "createwallet", json!({"wallet_name": "alpha"}));
        assert!(response.error.is_none(), "create failed: {response:?}");

        let response = call(&router, "listwallets", json!({}));
        let wallets = response.result.expect("list result");
        assert_eq!(wallets, json!({"wallets": ["alpha"]}));

        let response = call(&router, "unloadwallet", json!({"wallet_name": "alpha"}));
        assert!(response.error.is_none());
        let response = call(&router, "listwallets", json!({}));
        assert_eq!(response.result.expect("list result"), json!({"wallets": []}));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let router = router();
        let response = call(&router, "frobnicate", json!({}));
        let error = response.error.expect("error");
        assert_eq!(error.code, RpcErrorCode::MethodNotFound.as_i32());
    }

    #[test]
    fn missing_params_are_invalid() {
        let router = router();
        let response = router.handle(JsonRpcRequest::new("loadwallet", None));
        let error = response.error.expect("error");
        assert_eq!(error.code, RpcErrorCode::InvalidParams.as_i32());
    }

    #[test]
    fn loading_missing_wallet_maps_to_not_found() {
        let router = router();
        let response = call(&router, "loadwallet", json!({"wallet_name": "ghost"}));
        let error = response.error.expect("error");
        assert_eq!(error.code, RpcErrorCode::WalletNotFound.as_i32());
    }
}
