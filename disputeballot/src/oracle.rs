use crate::*;
use async_trait::async_trait;

/// An opaque per-slot commitment to a (vote, seed) pair.
///
/// Built by the ledger's own commitment scheme, never by the client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Commitment(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Read-only access to the ledger's commitment construction.
///
/// The voter's plaintext votes and seeds are sent here during simulation only.
/// Whatever implements this must not retain them.
#[async_trait]
pub trait CommitmentOracle: Send + Sync {
    async fn build_commitments(
        &self,
        project_id: u32,
        votes: &[u128; NUM_CHOICES],
        seeds: &[u128; NUM_CHOICES],
    ) -> Result<Vec<Commitment>, OracleError>;
}

/// Ask the oracle for one commitment per vote slot
pub async fn request_commitments<O: CommitmentOracle + ?Sized>(
    oracle: &O,
    project_id: u32,
    votes: &[u128; NUM_CHOICES],
    seeds: &[u128; NUM_CHOICES],
) -> Result<[Commitment; NUM_CHOICES], OracleError> {
    let commitments = oracle.build_commitments(project_id, votes, seeds).await?;
    let count = commitments.len();
    let commitments: [Commitment; NUM_CHOICES] = commitments
        .try_into()
        .map_err(|_| OracleError::WrongCommitmentCount(count))?;

    debug!("oracle built {} commitments for project {}", count, project_id);
    Ok(commitments)
}
