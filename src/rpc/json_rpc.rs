use super::LedgerClient;
use crate::error::RpcError;
use crate::models::{Blockhash, SignatureStatus, TokenAmount};
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;

type RpcRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// JSON-RPC 2.0 client for a ledger node over HTTP
///
/// Cloneable; clones share the HTTP pool and the rate limiter.
#[derive(Clone)]
pub struct JsonRpcClient {
    client: Client,
    url: String,
    commitment: String,
    rate_limiter: Arc<RpcRateLimiter>,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most account methods
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, commitment: impl Into<String>, requests_per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(RpcError::Transport)?;

        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            url: url.into(),
            commitment: commitment.into(),
            rate_limiter,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one rate-limited call and unwrap the JSON-RPC envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Response(format!("{} returned {}: {}", method, status, text)).into());
        }

        let envelope: RpcResponse<T> = response.json().await.map_err(RpcError::Transport)?;

        if let Some(err) = envelope.error {
            tracing::debug!(method, code = err.code, "rpc error: {}", err.message);
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        envelope
            .result
            .ok_or_else(|| RpcError::Response(format!("{} returned no result", method)).into())
    }

    fn decode_account(info: AccountInfo) -> Result<Vec<u8>> {
        let (payload, encoding) = info.data;
        if encoding != "base64" {
            return Err(RpcError::Encoding(format!("unexpected encoding {}", encoding)).into());
        }
        BASE64
            .decode(payload)
            .map_err(|e| RpcError::Encoding(e.to_string()).into())
    }

    fn token_amount(raw: UiTokenAmount) -> Result<TokenAmount> {
        let amount = raw
            .amount
            .parse::<u64>()
            .map_err(|_| RpcError::Response(format!("invalid token amount {}", raw.amount)))?;
        Ok(TokenAmount {
            amount,
            decimals: raw.decimals,
        })
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn get_account_data(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let res: WithContext<Option<AccountInfo>> = self
            .call(
                "getAccountInfo",
                json!([address, { "encoding": "base64", "commitment": self.commitment }]),
            )
            .await?;

        res.value.map(Self::decode_account).transpose()
    }

    async fn get_multiple_accounts(&self, addresses: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let res: WithContext<Vec<Option<AccountInfo>>> = self
            .call(
                "getMultipleAccounts",
                json!([addresses, { "encoding": "base64", "commitment": self.commitment }]),
            )
            .await?;

        res.value
            .into_iter()
            .map(|info| info.map(Self::decode_account).transpose())
            .collect()
    }

    async fn get_token_supply(&self, mint: &str) -> Result<TokenAmount> {
        let res: WithContext<UiTokenAmount> = self
            .call("getTokenSupply", json!([mint, { "commitment": self.commitment }]))
            .await?;
        Self::token_amount(res.value)
    }

    async fn get_token_account_balance(&self, account: &str) -> Result<TokenAmount> {
        let res: WithContext<UiTokenAmount> = self
            .call(
                "getTokenAccountBalance",
                json!([account, { "commitment": self.commitment }]),
            )
            .await?;
        Self::token_amount(res.value)
    }

    async fn get_latest_blockhash(&self) -> Result<Blockhash> {
        let res: WithContext<LatestBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": self.commitment }]))
            .await?;
        Ok(Blockhash {
            blockhash: res.value.blockhash,
            last_valid_block_height: res.value.last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> Result<u64> {
        self.call("getBlockHeight", json!([{ "commitment": self.commitment }]))
            .await
    }

    async fn send_transaction(&self, encoded: &str) -> Result<String> {
        self.call(
            "sendTransaction",
            json!([encoded, { "encoding": "base64", "preflightCommitment": self.commitment }]),
        )
        .await
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let res: WithContext<Vec<Option<RawSignatureStatus>>> = self
            .call("getSignatureStatuses", json!([[signature]]))
            .await?;

        Ok(res.value.into_iter().next().flatten().map(|s| SignatureStatus {
            confirmation_status: s.confirmation_status,
            err: s.err,
        }))
    }
}
