use crate::*;
use async_trait::async_trait;
use std::time::Duration;

/// Status of a submitted transaction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Accepted into the queue, not yet applied
    Pending,
    Success,
    Failed,
}

/// The ledger's answer to a transaction submission
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub hash: TxHash,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The ledger's answer to a transaction status poll
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The dispute ledger.
///
/// Reads are side-effect free simulations. Writes go through `send_transaction`
/// as signed calls and are applied atomically or not at all.
#[async_trait]
pub trait Ledger: CommitmentOracle {
    async fn get_dispute(&self, dispute_id: u32) -> Result<Dispute, LedgerError>;

    async fn get_anonymous_voting_config(
        &self,
        project_id: u32,
    ) -> Result<AnonymousVotingConfig, LedgerError>;

    /// Number of disputes created so far. Dispute ids run from 1 to this count.
    async fn get_dispute_count(&self) -> Result<u32, LedgerError>;

    /// The ledger's current time in unix seconds. Voting deadlines are judged by
    /// this clock, not the local one.
    async fn timestamp(&self) -> Result<u64, LedgerError> {
        Ok(unix_now())
    }

    /// Simulate the commitment check for a reveal without changing state
    async fn proof(&self, dispute_id: u32, reveal: &Reveal) -> Result<bool, LedgerError>;

    async fn send_transaction(&self, call: SignedCall) -> Result<Submission, LedgerError>;

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxReceipt, LedgerError>;
}

/// Bounded confirmation polling
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        ConfirmationPolicy {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// Sign a call, send it, and wait for the ledger to apply it.
///
/// Polls at most `policy.max_attempts` times. Once sent, the transaction cannot be
/// withdrawn; a timeout means its outcome is unknown, not that it failed.
pub async fn submit_and_confirm<L: Ledger + ?Sized>(
    ledger: &L,
    signer: &dyn TransactionSigner,
    call: LedgerCall,
    policy: &ConfirmationPolicy,
) -> Result<TxHash, Error> {
    let method = call.method();
    let signed = SignedCall::sign(signer, call).await?;
    let submission = ledger.send_transaction(signed).await?;

    match submission.status {
        TxStatus::Success => {
            info!("{} applied in {}", method, submission.hash);
            return Ok(submission.hash);
        }
        TxStatus::Failed => {
            let reason = submission
                .error
                .unwrap_or_else(|| format!("{} failed", method));
            return Err(LedgerError::Rejected(reason).into());
        }
        TxStatus::Pending => {
            debug!("{} pending as {}", method, submission.hash);
        }
    }

    let hash = submission.hash;
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.delay).await;

        let receipt = ledger.transaction_status(&hash).await?;
        match receipt.status {
            TxStatus::Success => {
                info!("{} confirmed in {} after {} polls", method, hash, attempt);
                return Ok(hash);
            }
            TxStatus::Failed => {
                let reason = receipt.error.unwrap_or_else(|| format!("{} failed", method));
                return Err(LedgerError::Rejected(reason).into());
            }
            TxStatus::Pending => {}
        }
    }

    warn!(
        "{} in {} still pending after {} polls",
        method, hash, policy.max_attempts
    );
    Err(LedgerError::ConfirmationTimeout {
        hash,
        attempts: policy.max_attempts,
    }
    .into())
}
