use super::ExecutionStrategy;
use crate::models::{ExecutionOutcome, SignedTransaction};
use crate::Result;
use async_trait::async_trait;

/// Logs the transaction and reports it confirmed. Nothing is submitted.
#[derive(Debug, Default, Clone)]
pub struct PaperStrategy;

#[async_trait]
impl ExecutionStrategy for PaperStrategy {
    async fn execute(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome> {
        tracing::info!(
            signature = %tx.signature,
            bytes = tx.encoded.len(),
            "📝 paper execution"
        );
        Ok(ExecutionOutcome::confirmed(tx.signature.clone()))
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paper_confirms_immediately() {
        let tx = SignedTransaction {
            signature: "sig".to_string(),
            encoded: "AAAA".to_string(),
            last_valid_block_height: 0,
        };

        let outcome = PaperStrategy.execute(&tx).await.unwrap();
        assert!(outcome.confirmed);
        assert_eq!(outcome.signature.as_deref(), Some("sig"));
    }
}
