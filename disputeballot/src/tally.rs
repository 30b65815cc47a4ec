use crate::*;
use rayon::prelude::*;

/// What to do with a ballot whose ciphertexts do not decrypt to well-formed plaintexts
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
    /// Leave the ballot out of the tally and record why
    #[default]
    Exclude,
    /// Abort the whole tally
    Strict,
}

/// A ballot left out of a tally
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BallotRejection {
    pub voter: Address,
    pub reason: String,
}

/// One ballot's decrypted vote and seed vectors with its weight
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub voter: Address,
    pub weight: u32,
    pub votes: [u128; NUM_CHOICES],
    pub seeds: [u128; NUM_CHOICES],
}

/// Weighted per-choice tallies and seed sums for one dispute
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TallyReport {
    pub dispute_id: u32,
    #[serde(with = "u128_triple")]
    pub tallies: [u128; NUM_CHOICES],
    #[serde(with = "u128_triple")]
    pub seeds: [u128; NUM_CHOICES],
    /// Voters whose ballots are in the sums
    pub included: Vec<Address>,
    pub rejected: Vec<BallotRejection>,
}

impl TallyReport {
    pub fn reveal(&self) -> Reveal {
        Reveal {
            tallies: self.tallies,
            seeds: self.seeds,
        }
    }

    /// Every ballot made it into the sums
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_tallies(&self.tallies)
    }
}

/// Decrypt and parse all six ciphertexts of a ballot
pub fn decrypt_ballot(
    ballot: &Ballot,
    private_key: &VotingPrivateKey,
) -> Result<Contribution, CryptoError> {
    let mut votes = [0; NUM_CHOICES];
    let mut seeds = [0; NUM_CHOICES];

    for i in 0..NUM_CHOICES {
        let vote = private_key.decrypt(&ballot.encrypted_votes[i])?;
        votes[i] = decode_tagged(Tag::Vote, &vote)?;

        let seed = private_key.decrypt(&ballot.encrypted_seeds[i])?;
        seeds[i] = decode_tagged(Tag::Seed, &seed)?;
    }

    // Exactly one slot set to 1
    if votes.iter().any(|v| *v > 1) || votes.iter().sum::<u128>() != 1 {
        return Err(CryptoError::NotOneHot(votes));
    }

    Ok(Contribution {
        voter: ballot.address.clone(),
        weight: ballot.weight,
        votes,
        seeds,
    })
}

/// Sum weighted contributions. The order of `contributions` does not matter.
pub fn combine<'a, I>(contributions: I) -> Result<([u128; NUM_CHOICES], [u128; NUM_CHOICES]), Error>
where
    I: IntoIterator<Item = &'a Contribution>,
{
    let mut tallies = [0u128; NUM_CHOICES];
    let mut seeds = [0u128; NUM_CHOICES];

    for contribution in contributions {
        let weight = contribution.weight as u128;
        for i in 0..NUM_CHOICES {
            tallies[i] = contribution.votes[i]
                .checked_mul(weight)
                .and_then(|v| tallies[i].checked_add(v))
                .ok_or(Error::ArithmeticOverflow)?;
            seeds[i] = contribution.seeds[i]
                .checked_mul(weight)
                .and_then(|s| seeds[i].checked_add(s))
                .ok_or(Error::ArithmeticOverflow)?;
        }
    }

    Ok((tallies, seeds))
}

/// Decrypt and tally ballots, excluding malformed ones
pub fn aggregate(
    dispute_id: u32,
    ballots: &[Ballot],
    private_key: &VotingPrivateKey,
) -> Result<TallyReport, Error> {
    aggregate_with_policy(dispute_id, ballots, private_key, RejectionPolicy::default())
}

/// Decrypt ballots in parallel, then fold their contributions in one pass
pub fn aggregate_with_policy(
    dispute_id: u32,
    ballots: &[Ballot],
    private_key: &VotingPrivateKey,
    policy: RejectionPolicy,
) -> Result<TallyReport, Error> {
    let decrypted: Vec<Result<Contribution, CryptoError>> = ballots
        .par_iter()
        .map(|ballot| decrypt_ballot(ballot, private_key))
        .collect();

    let mut contributions = Vec::with_capacity(ballots.len());
    let mut rejected = Vec::new();
    for (ballot, result) in ballots.iter().zip(decrypted) {
        match result {
            Ok(contribution) => contributions.push(contribution),
            Err(e) => match policy {
                RejectionPolicy::Strict => {
                    error!(
                        "dispute {}: ballot from {} is malformed, aborting tally",
                        dispute_id, ballot.address
                    );
                    return Err(e.into());
                }
                RejectionPolicy::Exclude => {
                    warn!(
                        "dispute {}: excluding ballot from {}: {}",
                        dispute_id, ballot.address, e
                    );
                    rejected.push(BallotRejection {
                        voter: ballot.address.clone(),
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    let (tallies, seeds) = combine(&contributions)?;
    info!(
        "dispute {}: tallied {} ballots, {} rejected",
        dispute_id,
        contributions.len(),
        rejected.len()
    );

    Ok(TallyReport {
        dispute_id,
        tallies,
        seeds,
        included: contributions.into_iter().map(|c| c.voter).collect(),
        rejected,
    })
}

/// Fetch a dispute's ballots and tally them off the async runtime
pub async fn tally_dispute<L: Ledger + ?Sized>(
    ledger: &L,
    dispute_id: u32,
    keypair: &KeyPair,
    policy: RejectionPolicy,
) -> Result<TallyReport, Error> {
    let dispute = ledger.get_dispute(dispute_id).await?;
    if dispute.project_id != keypair.project_id {
        return Err(CryptoError::InvalidKeyFile(format!(
            "key is for project {}, dispute {} belongs to project {}",
            keypair.project_id, dispute_id, dispute.project_id
        ))
        .into());
    }

    let private_key = keypair.private_key.clone();
    tokio::task::spawn_blocking(move || {
        aggregate_with_policy(dispute_id, &dispute.ballots, &private_key, policy)
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}
