//! TrustScore contract bindings and the batch score updater.
//!
//! The updater owns the single signing wallet; nothing else submits score
//! transactions, which is what keeps the nonce monotonic across cycles.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::cycle::ScoreSink;

// Type alias for the Alloy provider with wallet support.
// The filler stack is spelled out because Alloy has no shorter name for it.
type WalletProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::GasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::BlobGasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::NonceFiller,
                        alloy::providers::fillers::ChainIdFiller,
                    >,
                >,
            >,
        >,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    alloy::providers::RootProvider<alloy::transports::http::Http<alloy::transports::http::Client>>,
    alloy::transports::http::Http<alloy::transports::http::Client>,
    alloy::network::Ethereum,
>;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract TrustScore {
        function getScore(uint256 agentId) external view returns (uint256);
        function getDetailedReport(uint256 agentId) external view
            returns (uint256 score, uint256 totalFeedback, uint256 positiveFeedback, uint256 lastUpdated, bool exists);
        function batchUpdateScores(uint256[] ids, uint256[] scores, uint256[] totals, uint256[] positives) external;
    }
}

/// One agent's recomputed score, ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// The agent being updated.
    pub agent_id: U256,

    /// New score in `[0, max_score]`.
    pub score: u32,

    /// Total feedback folded into the score.
    pub total_feedback: u32,

    /// Positive feedback folded into the score.
    pub positive_feedback: u32,
}

/// Submits batched score updates through the single updater signer.
pub struct ScoreUpdater {
    contract: TrustScore::TrustScoreInstance<
        alloy::transports::http::Http<alloy::transports::http::Client>,
        WalletProvider,
    >,
}

impl ScoreUpdater {
    /// Create an updater bound to the TrustScore contract.
    pub fn new(rpc_url: &str, signer: PrivateKeySigner, contract_address: Address) -> Result<Self> {
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(
                rpc_url
                    .parse()
                    .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?,
            );

        let contract = TrustScore::new(contract_address, provider);

        Ok(Self { contract })
    }

    /// Submit one `batchUpdateScores` transaction and wait for its receipt.
    ///
    /// Returns the transaction hash. A reverted receipt is an error: the
    /// caller must not advance its checkpoint past an uncommitted batch.
    /// Re-submitting the same batch later is safe; the contract overwrites.
    pub async fn batch_update(&self, updates: &[ScoreUpdate]) -> Result<B256> {
        anyhow::ensure!(!updates.is_empty(), "Refusing to submit an empty batch");

        let ids: Vec<U256> = updates.iter().map(|u| u.agent_id).collect();
        let scores: Vec<U256> = updates.iter().map(|u| U256::from(u.score)).collect();
        let totals: Vec<U256> = updates.iter().map(|u| U256::from(u.total_feedback)).collect();
        let positives: Vec<U256> = updates
            .iter()
            .map(|u| U256::from(u.positive_feedback))
            .collect();

        let tx = self
            .contract
            .batchUpdateScores(ids, scores, totals, positives)
            .send()
            .await
            .context("Failed to send batchUpdateScores transaction")?;

        let tx_hash = *tx.tx_hash();
        tracing::info!("Transaction sent: {tx_hash}");

        let receipt = tx
            .get_receipt()
            .await
            .context("Failed to get transaction receipt")?;

        if !receipt.status() {
            return Err(anyhow::anyhow!(
                "Transaction reverted: {} in block {} - batchUpdateScores for {} agents failed on-chain",
                receipt.transaction_hash,
                receipt.block_number.unwrap_or_default(),
                updates.len()
            ));
        }

        tracing::info!(
            "Batch of {} score updates confirmed in block {}",
            updates.len(),
            receipt.block_number.unwrap_or_default()
        );

        Ok(tx_hash)
    }
}

#[async_trait]
impl ScoreSink for ScoreUpdater {
    async fn submit_batch(&self, updates: &[ScoreUpdate]) -> Result<B256> {
        self.batch_update(updates).await
    }
}
