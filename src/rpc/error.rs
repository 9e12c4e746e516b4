use serde_json::Value;

/// Stable wallet RPC error codes.
///
/// The numeric values follow the established wallet RPC convention and
/// are part of the external contract; changing one breaks callers that
/// match on codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    MiscError,
    InvalidParameter,
    WalletError,
    WalletNotFound,
    WalletAlreadyLoaded,
}

impl RpcErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RpcErrorCode::InvalidRequest => "INVALID_REQUEST",
            RpcErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            RpcErrorCode::InvalidParams => "INVALID_PARAMS",
            RpcErrorCode::InternalError => "INTERNAL_ERROR",
            RpcErrorCode::MiscError => "MISC_ERROR",
            RpcErrorCode::InvalidParameter => "INVALID_PARAMETER",
            RpcErrorCode::WalletError => "WALLET_ERROR",
            RpcErrorCode::WalletNotFound => "WALLET_NOT_FOUND",
            RpcErrorCode::WalletAlreadyLoaded => "WALLET_ALREADY_LOADED",
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::MiscError => -1,
            RpcErrorCode::InvalidParameter => -8,
            RpcErrorCode::WalletError => -4,
            RpcErrorCode::WalletNotFound => -18,
            RpcErrorCode::WalletAlreadyLoaded => -35,
        }
    }

    pub fn data_payload(self, details: Option<Value>) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert(
            "code".to_string(),
            Value::String(self.as_str().to_string()),
        );
        if let Some(details) = details {
            payload.insert("details".to_string(), details);
        }
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_error_code_is_stable() {
        assert_eq!(RpcErrorCode::WalletError.as_i32(), -4);
        assert_eq!(RpcErrorCode::WalletNotFound.as_i32(), -18);
        assert_eq!(RpcErrorCode::WalletError.as_str(), "WALLET_ERROR");
    }
}
