use thiserror::Error;

/// JSON-RPC "Invalid params" code. Some ledger nodes return it for
/// `getTokenSupply` on mints they cannot index.
pub const INVALID_PARAMS: i64 = -32602;

/// Errors from ledger RPC access (HTTP or websocket)
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected rpc response: {0}")]
    Response(String),

    #[error("account data could not be decoded: {0}")]
    Encoding(String),

    #[error("websocket failure: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl RpcError {
    /// Numeric JSON-RPC code, if the node answered with an error object
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors from decoding raw account bytes
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("{layout}: expected at least {expected} bytes, got {actual}")]
    TooShort {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{layout}: invalid utf-8 in field {field}")]
    InvalidString {
        layout: &'static str,
        field: &'static str,
    },

    #[error("invalid public key {0}")]
    InvalidPubkey(String),
}

/// Raw/UI token amount conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("{decimals} decimals exceeds the supported precision")]
    Precision { decimals: u8 },

    #[error("{amount} does not fit in raw units at {decimals} decimals")]
    Overflow { amount: String, decimals: u8 },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid configured amount: {0}")]
    Amount(#[from] AmountError),
}

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("swap construction failed: {0}")]
    Swap(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for BotError {
    fn from(e: redis::RedisError) -> Self {
        BotError::Persistence(e.to_string())
    }
}

impl BotError {
    /// JSON-RPC error code carried by this error, if any
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            BotError::Rpc(e) => e.code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_code_is_preserved() {
        let err: BotError = RpcError::Rpc {
            code: INVALID_PARAMS,
            message: "Invalid param: not a Token mint".to_string(),
        }
        .into();

        assert_eq!(err.rpc_code(), Some(-32602));
        assert!(err.to_string().contains("-32602"));
    }

    #[test]
    fn test_non_rpc_errors_have_no_code() {
        let err = BotError::AccountNotFound("abc".to_string());
        assert_eq!(err.rpc_code(), None);

        let err: BotError = RpcError::Response("missing result".to_string()).into();
        assert_eq!(err.rpc_code(), None);
    }
}
