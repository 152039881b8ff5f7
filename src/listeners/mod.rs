//! Websocket account subscriptions
//!
//! Two `programSubscribe` streams feed the controller: AMM v4 pools that
//! are open for swaps against the quote mint, and token accounts owned by
//! the wallet. Notifications become `LedgerEvent`s on an mpsc channel.

use crate::error::RpcError;
use crate::layout::{self, amm_v4, token_account};
use crate::models::{BalanceChanged, LedgerEvent, PoolOpened, POOL_STATUS_SWAP};
use crate::pubkey::{AMM_V4_PROGRAM_ID, OPENBOOK_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Notification {
    method: String,
    params: NotificationParams,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: NotificationResult,
}

#[derive(Debug, Deserialize)]
struct NotificationResult {
    value: KeyedAccount,
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    /// `[payload, encoding]`
    data: (String, String),
    owner: String,
}

/// Subscription parameters for one wallet
#[derive(Debug, Clone)]
pub struct Listener {
    ws_url: String,
    commitment: String,
    quote_mint: String,
    owner: String,
    auto_sell: bool,
    reconnect_delay: Duration,
}

impl Listener {
    pub fn new(
        ws_url: impl Into<String>,
        commitment: impl Into<String>,
        quote_mint: impl Into<String>,
        owner: impl Into<String>,
        auto_sell: bool,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            commitment: commitment.into(),
            quote_mint: quote_mint.into(),
            owner: owner.into(),
            auto_sell,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Pools quoted in the configured mint, routed through OpenBook,
    /// with swaps enabled
    pub fn pool_subscription(&self, id: u64) -> Value {
        let status = bs58::encode(POOL_STATUS_SWAP.to_le_bytes()).into_string();
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "programSubscribe",
            "params": [
                AMM_V4_PROGRAM_ID,
                {
                    "commitment": self.commitment,
                    "encoding": "base64",
                    "filters": [
                        { "dataSize": layout::AMM_V4_SIZE },
                        { "memcmp": { "offset": amm_v4::QUOTE_MINT, "bytes": self.quote_mint } },
                        { "memcmp": { "offset": amm_v4::MARKET_PROGRAM_ID, "bytes": OPENBOOK_PROGRAM_ID } },
                        { "memcmp": { "offset": amm_v4::STATUS, "bytes": status } }
                    ]
                }
            ]
        })
    }

    /// Token accounts owned by the wallet
    pub fn wallet_subscription(&self, id: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "programSubscribe",
            "params": [
                TOKEN_PROGRAM_ID,
                {
                    "commitment": self.commitment,
                    "encoding": "base64",
                    "filters": [
                        { "dataSize": layout::TOKEN_ACCOUNT_SIZE },
                        { "memcmp": { "offset": token_account::OWNER, "bytes": self.owner } }
                    ]
                }
            ]
        })
    }

    /// Stream events until `shutdown` fires or the receiver goes away,
    /// reconnecting after any failure.
    pub async fn run(&self, events: mpsc::Sender<LedgerEvent>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.stream(&events) => match result {
                    Ok(()) => tracing::warn!("Subscription stream ended"),
                    Err(e) => tracing::error!("Subscription error: {}", e),
                },
            }

            if events.is_closed() {
                break;
            }

            tracing::warn!("Reconnecting in {} seconds...", self.reconnect_delay.as_secs());
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        tracing::info!("Listener stopped");
    }

    async fn stream(&self, events: &mpsc::Sender<LedgerEvent>) -> Result<()> {
        tracing::info!("📡 Connecting to {}", self.ws_url);
        let (ws, _) = connect_async(self.ws_url.as_str()).await.map_err(RpcError::from)?;
        let (mut write, mut read) = ws.split();

        let mut requests = vec![self.pool_subscription(1)];
        if self.auto_sell {
            requests.push(self.wallet_subscription(2));
        }
        for request in requests {
            write
                .send(Message::Text(request.to_string()))
                .await
                .map_err(RpcError::from)?;
        }
        tracing::info!(auto_sell = self.auto_sell, "✅ Subscribed to new pools");

        while let Some(message) = read.next().await {
            match message.map_err(RpcError::from)? {
                Message::Text(text) => {
                    let Some(event) = parse_notification(&text) else {
                        continue;
                    };
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Message::Ping(data) => {
                    write.send(Message::Pong(data)).await.map_err(RpcError::from)?;
                }
                Message::Close(_) => {
                    tracing::warn!("WebSocket closed by server");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Turn a `programNotification` into an event. Subscription
/// confirmations and anything unrecognised yield `None`.
pub fn parse_notification(text: &str) -> Option<LedgerEvent> {
    let notification: Notification = match serde_json::from_str(text) {
        Ok(n) => n,
        Err(_) => {
            tracing::trace!("ignoring non-notification message");
            return None;
        }
    };
    if notification.method != "programNotification" {
        return None;
    }

    let keyed = notification.params.result.value;
    let (payload, encoding) = keyed.account.data;
    if encoding != "base64" {
        tracing::warn!(account = %keyed.pubkey, encoding = %encoding, "unexpected account encoding");
        return None;
    }
    let data = match BASE64.decode(payload) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(account = %keyed.pubkey, "undecodable account data: {}", e);
            return None;
        }
    };

    match keyed.account.owner.as_str() {
        AMM_V4_PROGRAM_ID => Some(LedgerEvent::PoolOpened(PoolOpened {
            pool_id: keyed.pubkey,
            data,
        })),
        TOKEN_PROGRAM_ID => Some(LedgerEvent::BalanceChanged(BalanceChanged {
            account_id: keyed.pubkey,
            data,
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubkey::WSOL_MINT;

    fn notification(pubkey: &str, owner: &str, data: &[u8]) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "programNotification",
            "params": {
                "result": {
                    "context": { "slot": 250_000_000u64 },
                    "value": {
                        "pubkey": pubkey,
                        "account": {
                            "data": [BASE64.encode(data), "base64"],
                            "executable": false,
                            "lamports": 6_124_800u64,
                            "owner": owner,
                            "rentEpoch": 361u64
                        }
                    }
                },
                "subscription": 24040
            }
        })
        .to_string()
    }

    fn listener(auto_sell: bool) -> Listener {
        Listener::new("wss://example.invalid", "confirmed", WSOL_MINT, OPENBOOK_PROGRAM_ID, auto_sell)
    }

    #[test]
    fn test_pool_subscription_filters() {
        let request = listener(true).pool_subscription(1);

        assert_eq!(request["method"], "programSubscribe");
        assert_eq!(request["params"][0], AMM_V4_PROGRAM_ID);

        let filters = request["params"][1]["filters"].as_array().unwrap();
        assert_eq!(filters[0]["dataSize"], 752);
        assert_eq!(filters[1]["memcmp"]["offset"], 432);
        assert_eq!(filters[1]["memcmp"]["bytes"], WSOL_MINT);
        assert_eq!(filters[2]["memcmp"]["offset"], 560);
        assert_eq!(filters[2]["memcmp"]["bytes"], OPENBOOK_PROGRAM_ID);

        let status = bs58::decode(filters[3]["memcmp"]["bytes"].as_str().unwrap())
            .into_vec()
            .unwrap();
        assert_eq!(status, 6u64.to_le_bytes());
    }

    #[test]
    fn test_wallet_subscription_filters() {
        let request = listener(true).wallet_subscription(2);
        let filters = request["params"][1]["filters"].as_array().unwrap();

        assert_eq!(request["params"][0], TOKEN_PROGRAM_ID);
        assert_eq!(filters[0]["dataSize"], 165);
        assert_eq!(filters[1]["memcmp"]["offset"], 32);
        assert_eq!(filters[1]["memcmp"]["bytes"], OPENBOOK_PROGRAM_ID);
    }

    #[test]
    fn test_parse_pool_notification() {
        let text = notification("pool-1", AMM_V4_PROGRAM_ID, &[1, 2, 3]);

        assert_eq!(
            parse_notification(&text),
            Some(LedgerEvent::PoolOpened(PoolOpened {
                pool_id: "pool-1".to_string(),
                data: vec![1, 2, 3],
            }))
        );
    }

    #[test]
    fn test_parse_token_notification() {
        let text = notification("ata-1", TOKEN_PROGRAM_ID, &[9; 4]);

        assert!(matches!(
            parse_notification(&text),
            Some(LedgerEvent::BalanceChanged(BalanceChanged { account_id, .. })) if account_id == "ata-1"
        ));
    }

    #[test]
    fn test_ignores_confirmations_and_foreign_owners() {
        assert_eq!(parse_notification(r#"{"jsonrpc":"2.0","result":24040,"id":1}"#), None);
        assert_eq!(parse_notification("not json"), None);

        let text = notification("other", OPENBOOK_PROGRAM_ID, &[0]);
        assert_eq!(parse_notification(&text), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let listener = Listener {
            reconnect_delay: Duration::from_secs(60),
            ..listener(false)
        };
        let (tx, _rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio_test::assert_ready!(tokio_test::task::spawn(listener.run(tx, shutdown)).poll());
    }
}
