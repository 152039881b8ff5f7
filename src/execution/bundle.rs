use super::{confirm_signature, ExecutionStrategy};
use crate::error::BotError;
use crate::models::{ExecutionOutcome, SignedTransaction};
use crate::rpc::LedgerClient;
use crate::swap::SwapBuilder;
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const BLOCK_ENGINE_ENDPOINTS: [&str; 5] = [
    "https://mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
];

pub const TIP_ACCOUNTS_MAINNET: [&str; 8] = [
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
];

pub const TIP_ACCOUNTS_DEVNET: [&str; 8] = [
    "B1mrQSpdeMU9gCvkJ6VsXVVoYjRGkNA7TtjMyqxrhecH",
    "aTtUk2DHgLhKZRDjePq6eiHRKC1XXFMBiSUfQ2JNDbN",
    "E2eSqe33tuhAHKTrwky5uEjaVqnb2T9ns6nHHUrN8588",
    "4xgEmT58RwTNsF5xm2RMYCnR1EVukdK8a1i2qFjnJFu3",
    "EoW3SUQap7ZeynXQ2QJ847aerhxbPVr843uMeTfc9dxM",
    "ARTtviJkLLt6cHGQDydfo1Wyk6M4VGZdKZ2ZhdnJL336",
    "9n3d1K5YD2vECAbRFhFFGYNNjiXtHXJWn9F31t89vsAV",
    "9ttgPBBhRYFuQccdR1DSnb7hydsWANoDsV3P9kaGMCEh",
];

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Submit `[tip, swap]` as a relay bundle to every block engine at once.
///
/// The tip lands only if the whole bundle lands, so confirming the tip
/// signature confirms the swap.
pub struct BundleStrategy {
    client: Arc<dyn LedgerClient>,
    builder: Arc<dyn SwapBuilder>,
    http: Client,
    endpoints: Vec<String>,
    tip_accounts: Vec<String>,
    tip_lamports: u64,
    poll_interval: Duration,
}

impl BundleStrategy {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        builder: Arc<dyn SwapBuilder>,
        endpoints: Vec<String>,
        tip_accounts: Vec<String>,
        tip_lamports: u64,
        poll_interval: Duration,
    ) -> Result<Self> {
        if endpoints.is_empty() || tip_accounts.is_empty() {
            return Err(BotError::Execution(
                "bundle strategy needs at least one endpoint and tip account".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BotError::Execution(e.to_string()))?;

        Ok(Self {
            client,
            builder,
            http,
            endpoints,
            tip_accounts,
            tip_lamports,
            poll_interval,
        })
    }

    fn pick_tip_account(&self) -> &str {
        self.tip_accounts
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(TIP_ACCOUNTS_MAINNET[0])
    }

    /// Block engines take base58 wire transactions
    fn to_base58(tx: &SignedTransaction) -> Result<String> {
        let bytes = BASE64
            .decode(&tx.encoded)
            .map_err(|e| BotError::Execution(format!("invalid transaction encoding: {}", e)))?;
        Ok(bs58::encode(bytes).into_string())
    }

    async fn post_bundle(&self, url: &str, body: &Value) -> Result<String> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::Execution(format!("{}: {}", url, e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| BotError::Execution(format!("{}: {}", url, e)))?;

        if !status.is_success() || payload.get("error").is_some() {
            return Err(BotError::Execution(format!(
                "{} rejected bundle ({}): {}",
                url, status, payload
            )));
        }

        Ok(payload["result"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl ExecutionStrategy for BundleStrategy {
    async fn execute(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome> {
        let tip_account = self.pick_tip_account();
        tracing::debug!(tip_account = %tip_account, lamports = self.tip_lamports, "building relay tip");

        let tip = self.builder.build_tip(tip_account, self.tip_lamports).await?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [[Self::to_base58(&tip)?, Self::to_base58(tx)?]],
        });

        let results = join_all(self.endpoints.iter().map(|url| self.post_bundle(url, &body))).await;

        let mut accepted = 0;
        for result in &results {
            match result {
                Ok(bundle_id) => {
                    accepted += 1;
                    tracing::trace!(bundle_id = %bundle_id, "bundle accepted");
                }
                Err(e) => tracing::trace!("{}", e),
            }
        }

        if accepted == 0 {
            tracing::info!("no block engine accepted the bundle");
            return Ok(ExecutionOutcome::rejected(None, "bundle rejected by every endpoint"));
        }

        tracing::debug!(accepted, tip_signature = %tip.signature, "confirming bundle tip");

        let outcome = confirm_signature(
            self.client.as_ref(),
            &tip.signature,
            tip.last_valid_block_height,
            self.poll_interval,
        )
        .await?;

        if outcome.confirmed {
            Ok(ExecutionOutcome::confirmed(tx.signature.clone()))
        } else {
            Ok(ExecutionOutcome::rejected(
                Some(tx.signature.clone()),
                outcome.error.unwrap_or_else(|| "bundle did not land".to_string()),
            ))
        }
    }

    fn uses_tip(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "bundle"
    }
}
