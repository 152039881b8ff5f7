use super::{confirm_signature, ExecutionStrategy};
use crate::models::{ExecutionOutcome, SignedTransaction};
use crate::rpc::LedgerClient;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Send straight to the RPC node and poll for confirmation
pub struct DirectStrategy {
    client: Arc<dyn LedgerClient>,
    poll_interval: Duration,
}

impl DirectStrategy {
    pub fn new(client: Arc<dyn LedgerClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }
}

#[async_trait]
impl ExecutionStrategy for DirectStrategy {
    async fn execute(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome> {
        let signature = self.client.send_transaction(&tx.encoded).await?;
        if signature != tx.signature {
            tracing::debug!(expected = %tx.signature, returned = %signature, "node returned a different signature");
        }

        tracing::debug!(signature = %signature, "transaction sent, awaiting confirmation");

        confirm_signature(
            self.client.as_ref(),
            &signature,
            tx.last_valid_block_height,
            self.poll_interval,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
