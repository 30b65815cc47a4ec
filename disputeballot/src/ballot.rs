use crate::*;

/// One voter's anonymous ballot for a dispute.
///
/// Slot `i` of every array belongs to choice index `i` (approve, reject, abstain).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub address: Address,
    pub weight: u32,
    pub encrypted_votes: [Ciphertext; NUM_CHOICES],
    pub encrypted_seeds: [Ciphertext; NUM_CHOICES],
    pub commitments: [Commitment; NUM_CHOICES],
}

/// Check that `voter` may cast a ballot on `dispute` at time `now`, returning
/// the weight the ledger assigned at registration.
pub fn check_eligibility(dispute: &Dispute, voter: &Address, now: u64) -> Result<u32, Error> {
    if dispute.status.is_finalized() {
        return Err(StateError::AlreadyFinalized(dispute.id).into());
    }
    if dispute.voting_closed(now) {
        return Err(StateError::VotingClosed(dispute.id).into());
    }

    let registration =
        dispute
            .registration(voter)
            .ok_or_else(|| AuthorizationError::NotRegistered {
                voter: voter.clone(),
                dispute_id: dispute.id,
            })?;

    if dispute.has_voted(voter) {
        return Err(StateError::AlreadyVoted {
            voter: voter.clone(),
            dispute_id: dispute.id,
        }
        .into());
    }
    if registration.weight == 0 {
        return Err(ValidationError::ZeroWeight.into());
    }

    Ok(registration.weight)
}

/// Registers voters and casts their ballots
pub struct BallotSubmitter<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    policy: ConfirmationPolicy,
    coordinator: Option<&'a DisputeLifecycleCoordinator<'a, L>>,
}

impl<'a, L: Ledger + ?Sized> BallotSubmitter<'a, L> {
    pub fn new(ledger: &'a L, policy: ConfirmationPolicy) -> Self {
        BallotSubmitter {
            ledger,
            policy,
            coordinator: None,
        }
    }

    /// Record every confirmed ballot as cast with `coordinator`
    pub fn with_coordinator(mut self, coordinator: &'a DisputeLifecycleCoordinator<'a, L>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Register the signer as a voter on a dispute
    pub async fn register(
        &self,
        signer: &dyn TransactionSigner,
        dispute_id: u32,
    ) -> Result<TxHash, Error> {
        let voter = signer.address();
        let dispute = self.ledger.get_dispute(dispute_id).await?;

        if dispute.status.is_finalized() {
            return Err(StateError::AlreadyFinalized(dispute_id).into());
        }
        if dispute.voting_closed(self.ledger.timestamp().await?) {
            return Err(StateError::VotingClosed(dispute_id).into());
        }
        if dispute.is_party(voter) {
            return Err(AuthorizationError::PartyCannotVote(voter.clone()).into());
        }
        if dispute.registration(voter).is_some() {
            return Err(StateError::AlreadyRegistered {
                voter: voter.clone(),
                dispute_id,
            }
            .into());
        }

        let call = LedgerCall::RegisterToVote {
            voter: voter.clone(),
            dispute_id,
        };
        submit_and_confirm(self.ledger, signer, call, &self.policy).await
    }

    /// Encode, encrypt, commit and submit a ballot for the signer.
    ///
    /// `choice` is `None` when the voter selected nothing.
    pub async fn cast(
        &self,
        signer: &dyn TransactionSigner,
        dispute_id: u32,
        choice: Option<VoteChoice>,
    ) -> Result<TxHash, Error> {
        let choice = choice.ok_or(ValidationError::NoChoiceSelected)?;
        let voter = signer.address();

        let dispute = self.ledger.get_dispute(dispute_id).await?;
        let now = self.ledger.timestamp().await?;
        let weight = check_eligibility(&dispute, voter, now)?;

        let config = self
            .ledger
            .get_anonymous_voting_config(dispute.project_id)
            .await?;
        let public_key = config.voting_key()?;

        let sealed = VoteEncoder::new(&public_key).seal(choice)?;
        let commitments =
            request_commitments(self.ledger, dispute.project_id, &sealed.votes, &sealed.seeds)
                .await?;

        let ballot = Ballot {
            address: voter.clone(),
            weight,
            encrypted_votes: sealed.encrypted_votes,
            encrypted_seeds: sealed.encrypted_seeds,
            commitments,
        };

        self.submit(signer, dispute_id, ballot).await
    }

    /// Submit an already built ballot
    pub async fn submit(
        &self,
        signer: &dyn TransactionSigner,
        dispute_id: u32,
        ballot: Ballot,
    ) -> Result<TxHash, Error> {
        if &ballot.address != signer.address() {
            return Err(AuthorizationError::SignerMismatch {
                signer: signer.address().clone(),
                caller: ballot.address.clone(),
            }
            .into());
        }
        if ballot.weight == 0 {
            return Err(ValidationError::ZeroWeight.into());
        }

        let voter = ballot.address.clone();
        let call = LedgerCall::Vote {
            voter: voter.clone(),
            dispute_id,
            ballot,
        };
        let hash = submit_and_confirm(self.ledger, signer, call, &self.policy).await?;
        info!("ballot for dispute {} stored in {}", dispute_id, hash);

        if let Some(coordinator) = self.coordinator {
            coordinator.record_cast(dispute_id, &voter);
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispute_with(voter: &Address, weight: u32) -> Dispute {
        Dispute {
            id: 3,
            project_id: 1,
            creator: Address::from_ed25519(&[1; 32]),
            counterpart: Address::from_ed25519(&[2; 32]),
            proof: "delivered late".to_owned(),
            voting_ends_at: 1_000,
            status: DisputeStatus::Open,
            winner: None,
            votes: VoteCounts::default(),
            registered: vec![RegisteredVoter {
                address: voter.clone(),
                weight,
            }],
            ballots: vec![],
        }
    }

    fn ballot_for(voter: &Address) -> Ballot {
        Ballot {
            address: voter.clone(),
            weight: 3,
            encrypted_votes: [
                Ciphertext(vec![1]),
                Ciphertext(vec![2]),
                Ciphertext(vec![3]),
            ],
            encrypted_seeds: [
                Ciphertext(vec![4]),
                Ciphertext(vec![5]),
                Ciphertext(vec![6]),
            ],
            commitments: [
                Commitment(vec![7]),
                Commitment(vec![8]),
                Commitment(vec![9]),
            ],
        }
    }

    #[test]
    fn eligible_voter_gets_registered_weight() {
        let voter = Address::from_ed25519(&[9; 32]);
        let dispute = dispute_with(&voter, 3);
        assert_eq!(check_eligibility(&dispute, &voter, 999).unwrap(), 3);
    }

    #[test]
    fn ineligible_voters_are_refused() {
        let voter = Address::from_ed25519(&[9; 32]);
        let stranger = Address::from_ed25519(&[8; 32]);
        let mut dispute = dispute_with(&voter, 3);

        assert!(matches!(
            check_eligibility(&dispute, &stranger, 10),
            Err(Error::Authorization(AuthorizationError::NotRegistered { .. }))
        ));
        assert!(matches!(
            check_eligibility(&dispute, &voter, 1_000),
            Err(Error::State(StateError::VotingClosed(3)))
        ));

        dispute.ballots.push(ballot_for(&voter));
        assert!(matches!(
            check_eligibility(&dispute, &voter, 10),
            Err(Error::State(StateError::AlreadyVoted { .. }))
        ));

        dispute.status = DisputeStatus::Abstain;
        assert!(matches!(
            check_eligibility(&dispute, &voter, 10),
            Err(Error::State(StateError::AlreadyFinalized(3)))
        ));
    }

    #[test]
    fn ballot_json_uses_wire_encodings() {
        let voter = Address::from_ed25519(&[9; 32]);
        let json = serde_json::to_value(ballot_for(&voter)).unwrap();
        assert_eq!(json["encrypted_votes"][0], "AQ==");
        assert_eq!(json["commitments"][2], "09");
        assert_eq!(json["weight"], 3);
    }
}
