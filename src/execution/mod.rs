pub mod bundle;
pub mod direct;
pub mod paper;

pub use bundle::BundleStrategy;
pub use direct::DirectStrategy;
pub use paper::PaperStrategy;

use crate::models::ExecutionOutcome;
use crate::models::SignedTransaction;
use crate::rpc::LedgerClient;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Submits a built transaction and waits for it to land.
///
/// `Ok` with `confirmed: false` is an explicit rejection or expiry;
/// `Err` is a transport failure. Both are retryable by the caller.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    async fn execute(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome>;

    /// Whether this strategy pays a relay tip instead of a priority fee
    fn uses_tip(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Poll a signature until it lands, fails, or its blockhash expires
pub async fn confirm_signature(
    client: &dyn LedgerClient,
    signature: &str,
    last_valid_block_height: u64,
    poll_interval: Duration,
) -> Result<ExecutionOutcome> {
    loop {
        if let Some(status) = client.get_signature_status(signature).await? {
            if let Some(err) = status.err {
                return Ok(ExecutionOutcome::rejected(
                    Some(signature.to_string()),
                    format!("transaction failed: {}", err),
                ));
            }
            if status.is_landed() {
                return Ok(ExecutionOutcome::confirmed(signature));
            }
        }

        let height = client.get_block_height().await?;
        if height > last_valid_block_height {
            return Ok(ExecutionOutcome::rejected(
                Some(signature.to_string()),
                format!(
                    "blockhash expired at height {} (last valid {})",
                    height, last_valid_block_height
                ),
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignatureStatus;
    use crate::rpc::testing::FakeLedger;
    use serde_json::json;

    const POLL: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_confirmed_signature() {
        let ledger = FakeLedger::new();
        ledger.set_status(
            "sig",
            SignatureStatus {
                confirmation_status: Some("confirmed".to_string()),
                err: None,
            },
        );

        let outcome = confirm_signature(&ledger, "sig", 100, POLL).await.unwrap();
        assert!(outcome.confirmed);
        assert_eq!(outcome.signature.as_deref(), Some("sig"));
    }

    #[tokio::test]
    async fn test_failed_transaction_is_rejected() {
        let ledger = FakeLedger::new();
        ledger.set_status(
            "sig",
            SignatureStatus {
                confirmation_status: Some("confirmed".to_string()),
                err: Some(json!({ "InstructionError": [0, { "Custom": 30 }] })),
            },
        );

        let outcome = confirm_signature(&ledger, "sig", 100, POLL).await.unwrap();
        assert!(!outcome.confirmed);
        assert!(outcome.error.unwrap().contains("InstructionError"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_blockhash_is_rejected() {
        let ledger = FakeLedger::new();
        ledger.set_block_height(1_000);

        let outcome = confirm_signature(&ledger, "sig", 900, POLL).await.unwrap();
        assert!(!outcome.confirmed);
        assert!(outcome.error.unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let ledger = FakeLedger::new();
        ledger.set_offline(true);

        assert!(confirm_signature(&ledger, "sig", 100, POLL).await.is_err());
    }
}
