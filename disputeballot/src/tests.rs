use super::*;
use async_trait::async_trait;
use lazy_static::lazy_static;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

lazy_static! {
    /// 2048-bit keys take a while to generate, so every test shares one.
    pub static ref TEST_KEYS: KeyPair = {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        KeyPair::generate_with_rng(&mut rng, 1, Some(7)).unwrap()
    };
}

const PROJECT_ID: u32 = 1;
const VOTING_ENDS_AT: u64 = 1_000_000;

fn fast_policy() -> ConfirmationPolicy {
    ConfirmationPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(5),
    }
}

struct Fixture {
    ledger: MemLedger,
    maintainer: Ed25519Signer,
    creator: Address,
    counterpart: Address,
    dispute_id: u32,
}

async fn setup() -> Fixture {
    let maintainer = Ed25519Signer::generate();
    let creator = Address::from_ed25519(&[1; 32]);
    let counterpart = Address::from_ed25519(&[2; 32]);

    let ledger = MemLedger::new(maintainer.address().clone());
    ledger.set_time(VOTING_ENDS_AT - 100);
    let dispute_id = ledger.create_dispute(
        PROJECT_ID,
        creator.clone(),
        counterpart.clone(),
        "milestone 2 was never delivered",
        VOTING_ENDS_AT,
    );

    TEST_KEYS
        .publish(&ledger, &maintainer, maintainer.address(), &fast_policy())
        .await
        .unwrap();

    Fixture {
        ledger,
        maintainer,
        creator,
        counterpart,
        dispute_id,
    }
}

async fn register_and_vote(fixture: &Fixture, choice: VoteChoice) -> Ed25519Signer {
    let voter = Ed25519Signer::generate();
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());
    submitter.register(&voter, fixture.dispute_id).await.unwrap();
    submitter
        .cast(&voter, fixture.dispute_id, Some(choice))
        .await
        .unwrap();
    voter
}

#[tokio::test]
async fn end_to_end_dispute() {
    let fixture = setup().await;
    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );

    // Two approvals at the default weight of 3
    let first = Ed25519Signer::generate();
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy()).with_coordinator(&coordinator);
    submitter.register(&first, fixture.dispute_id).await.unwrap();
    submitter
        .cast(&first, fixture.dispute_id, Some(VoteChoice::Approve))
        .await
        .unwrap();
    assert_eq!(
        coordinator.ballot_state(fixture.dispute_id, first.address()),
        Some(BallotState::Cast)
    );
    register_and_vote(&fixture, VoteChoice::Approve).await;

    assert_eq!(
        coordinator.state(fixture.dispute_id).await.unwrap(),
        LifecycleState::Open
    );
    assert_eq!(
        coordinator.ballot_state(fixture.dispute_id, first.address()),
        Some(BallotState::Stored)
    );

    // Ballots hide the choice but expose the weight
    let dispute = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    assert_eq!(dispute.ballots.len(), 2);
    assert!(dispute.ballots.iter().all(|b| b.weight == DEFAULT_WEIGHT));

    fixture.ledger.set_time(VOTING_ENDS_AT);
    assert_eq!(
        coordinator.state(fixture.dispute_id).await.unwrap(),
        LifecycleState::AwaitingExecution
    );

    let report = tally_dispute(
        &fixture.ledger,
        fixture.dispute_id,
        &TEST_KEYS,
        RejectionPolicy::Exclude,
    )
    .await
    .unwrap();
    assert_eq!(report.tallies, [6, 0, 0]);

    let submitter = ProofSubmitter::new(&coordinator, fast_policy());
    let finalized = submitter
        .finalize_report(&fixture.maintainer, &report)
        .await
        .unwrap();

    assert_eq!(finalized.dispute.status, DisputeStatus::Creator);
    assert_eq!(finalized.dispute.winner, Some(fixture.creator.clone()));
    assert_eq!(finalized.dispute.votes.approve, 6);
    assert_eq!(
        coordinator.ballot_state(fixture.dispute_id, first.address()),
        Some(BallotState::IncludedInTally)
    );

    // Finalized is terminal
    let again = submitter.finalize_report(&fixture.maintainer, &report).await;
    assert!(matches!(
        again,
        Err(Error::State(StateError::AlreadyFinalized(_)))
    ));
}

#[tokio::test]
async fn tie_has_no_winner() {
    let fixture = setup().await;
    fixture.ledger.set_registration_weight(2);
    register_and_vote(&fixture, VoteChoice::Approve).await;
    register_and_vote(&fixture, VoteChoice::Reject).await;
    fixture.ledger.set_time(VOTING_ENDS_AT + 1);

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();
    assert_eq!(report.tallies, [2, 2, 0]);

    let finalized = ProofSubmitter::new(&coordinator, fast_policy())
        .finalize_report(&fixture.maintainer, &report)
        .await
        .unwrap();
    assert_eq!(finalized.dispute.status, DisputeStatus::Abstain);
    assert_eq!(finalized.dispute.winner, None);
    assert_ne!(finalized.dispute.winner, Some(fixture.counterpart.clone()));
}

#[tokio::test]
async fn inflated_ballot_is_excluded_from_the_tally() {
    let fixture = setup().await;
    register_and_vote(&fixture, VoteChoice::Reject).await;

    // Sealed by hand with 1000 in the approve slot, committed by the oracle
    let cheat = Ed25519Signer::generate();
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());
    submitter.register(&cheat, fixture.dispute_id).await.unwrap();

    let votes = [1000, 0, 0];
    let seeds = [21, 22, 23];
    let encrypt = |tag, value| {
        TEST_KEYS
            .public_key
            .encrypt(&mut rand::thread_rng(), encode_tagged(tag, value).as_bytes())
            .unwrap()
    };
    let commitments = request_commitments(&fixture.ledger, PROJECT_ID, &votes, &seeds)
        .await
        .unwrap();
    let ballot = Ballot {
        address: cheat.address().clone(),
        weight: DEFAULT_WEIGHT,
        encrypted_votes: votes.map(|v| encrypt(Tag::Vote, v)),
        encrypted_seeds: seeds.map(|s| encrypt(Tag::Seed, s)),
        commitments,
    };
    submitter.submit(&cheat, fixture.dispute_id, ballot).await.unwrap();
    fixture.ledger.set_time(VOTING_ENDS_AT);

    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Exclude)
        .await
        .unwrap();
    assert_eq!(report.tallies, [0, 3, 0]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(&report.rejected[0].voter, cheat.address());

    let err = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Crypto(CryptoError::NotOneHot([1000, 0, 0]))));

    // The report is incomplete, so it is not revealed by default
    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let err = ProofSubmitter::new(&coordinator, fast_policy())
        .finalize_report(&fixture.maintainer, &report)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::State(StateError::IncompleteTally { rejected: 1, .. })
    ));
}

#[tokio::test]
async fn second_ballot_is_refused() {
    let fixture = setup().await;
    let voter = register_and_vote(&fixture, VoteChoice::Reject).await;

    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());
    let again = submitter
        .cast(&voter, fixture.dispute_id, Some(VoteChoice::Approve))
        .await;
    assert!(matches!(
        again,
        Err(Error::State(StateError::AlreadyVoted { .. }))
    ));

    // The ledger refuses it too when the local check is bypassed
    let dispute = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    let replay = dispute.ballots[0].clone();
    let direct = submitter.submit(&voter, fixture.dispute_id, replay).await;
    assert!(matches!(direct, Err(Error::Ledger(LedgerError::Rejected(_)))));

    let dispute = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    assert_eq!(dispute.ballots.len(), 1);
}

#[tokio::test]
async fn voting_rules() {
    let fixture = setup().await;
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());
    let voter = Ed25519Signer::generate();

    // Nothing selected
    let err = submitter.cast(&voter, fixture.dispute_id, None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::NoChoiceSelected)
    ));

    // Not registered
    let err = submitter
        .cast(&voter, fixture.dispute_id, Some(VoteChoice::Abstain))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Authorization(AuthorizationError::NotRegistered { .. })
    ));

    // Parties cannot register
    let creator_key = Ed25519Signer::generate();
    let other_id = fixture.ledger.create_dispute(
        PROJECT_ID,
        creator_key.address().clone(),
        fixture.counterpart.clone(),
        "",
        VOTING_ENDS_AT,
    );
    let err = submitter.register(&creator_key, other_id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Authorization(AuthorizationError::PartyCannotVote(_))
    ));

    // Registered, but too late
    submitter.register(&voter, fixture.dispute_id).await.unwrap();
    let err = submitter.register(&voter, fixture.dispute_id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::State(StateError::AlreadyRegistered { .. })
    ));
    fixture.ledger.set_time(VOTING_ENDS_AT);
    let err = submitter
        .cast(&voter, fixture.dispute_id, Some(VoteChoice::Approve))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::State(StateError::VotingClosed(_))));
}

#[tokio::test]
async fn oracle_failure_stops_the_ballot() {
    let fixture = setup().await;
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());
    let voter = Ed25519Signer::generate();
    submitter.register(&voter, fixture.dispute_id).await.unwrap();

    fixture.ledger.set_oracle_offline(true);
    let err = submitter
        .cast(&voter, fixture.dispute_id, Some(VoteChoice::Approve))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Oracle(OracleError::CommitmentRequest(_))
    ));

    let dispute = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    assert!(dispute.ballots.is_empty());
}

#[tokio::test]
async fn wrong_reveal_leaves_dispute_untouched() {
    let fixture = setup().await;
    register_and_vote(&fixture, VoteChoice::Approve).await;
    register_and_vote(&fixture, VoteChoice::Reject).await;
    register_and_vote(&fixture, VoteChoice::Reject).await;
    fixture.ledger.set_time(VOTING_ENDS_AT);

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();
    assert_eq!(report.tallies, [3, 6, 0]);

    // Claim the creator won
    let forged = Reveal {
        tallies: [6, 3, 0],
        seeds: report.seeds,
    };
    let submitter = ProofSubmitter::new(&coordinator, fast_policy());
    let err = submitter
        .finalize(&fixture.maintainer, fixture.dispute_id, &forged)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::ProofRejected)));

    // Skip the pre-check and send it anyway: the ledger rejects it as a whole
    let call = LedgerCall::Execute {
        maintainer: fixture.maintainer.address().clone(),
        project_id: PROJECT_ID,
        dispute_id: fixture.dispute_id,
        reveal: Some(forged),
    };
    let err = submit_and_confirm(&fixture.ledger, &fixture.maintainer, call, &fast_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::Rejected(_))));

    let dispute = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(dispute.winner, None);
    assert_eq!(dispute.votes, VoteCounts::default());

    // The honest reveal still goes through
    let finalized = submitter
        .finalize_report(&fixture.maintainer, &report)
        .await
        .unwrap();
    assert_eq!(finalized.dispute.status, DisputeStatus::Counterpart);
    assert_eq!(finalized.dispute.winner, Some(fixture.counterpart.clone()));
}

/// Forwards to a MemLedger, but dispute reads fail once an execute has been sent
struct ReadsFailAfterExecute<'a> {
    inner: &'a MemLedger,
    executed: AtomicBool,
}

#[async_trait]
impl<'a> CommitmentOracle for ReadsFailAfterExecute<'a> {
    async fn build_commitments(
        &self,
        project_id: u32,
        votes: &[u128; NUM_CHOICES],
        seeds: &[u128; NUM_CHOICES],
    ) -> Result<Vec<Commitment>, OracleError> {
        self.inner.build_commitments(project_id, votes, seeds).await
    }
}

#[async_trait]
impl<'a> Ledger for ReadsFailAfterExecute<'a> {
    async fn get_dispute(&self, dispute_id: u32) -> Result<Dispute, LedgerError> {
        if self.executed.load(Ordering::SeqCst) {
            return Err(LedgerError::UnexpectedResponse("read timed out".to_owned()));
        }
        self.inner.get_dispute(dispute_id).await
    }

    async fn get_anonymous_voting_config(
        &self,
        project_id: u32,
    ) -> Result<AnonymousVotingConfig, LedgerError> {
        self.inner.get_anonymous_voting_config(project_id).await
    }

    async fn get_dispute_count(&self) -> Result<u32, LedgerError> {
        self.inner.get_dispute_count().await
    }

    async fn timestamp(&self) -> Result<u64, LedgerError> {
        self.inner.timestamp().await
    }

    async fn proof(&self, dispute_id: u32, reveal: &Reveal) -> Result<bool, LedgerError> {
        self.inner.proof(dispute_id, reveal).await
    }

    async fn send_transaction(&self, call: SignedCall) -> Result<Submission, LedgerError> {
        if let LedgerCall::Execute { .. } = call.call {
            self.executed.store(true, Ordering::SeqCst);
        }
        self.inner.send_transaction(call).await
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxReceipt, LedgerError> {
        self.inner.transaction_status(hash).await
    }
}

#[tokio::test]
async fn finalize_survives_a_failed_reread() {
    let fixture = setup().await;
    let voter = register_and_vote(&fixture, VoteChoice::Reject).await;
    fixture.ledger.set_time(VOTING_ENDS_AT);
    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();

    let ledger = ReadsFailAfterExecute {
        inner: &fixture.ledger,
        executed: AtomicBool::new(false),
    };
    let coordinator = DisputeLifecycleCoordinator::new(
        &ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let finalized = ProofSubmitter::new(&coordinator, fast_policy())
        .finalize_report(&fixture.maintainer, &report)
        .await
        .unwrap();

    assert_eq!(finalized.dispute.status, DisputeStatus::Counterpart);
    assert_eq!(finalized.dispute.winner, Some(fixture.counterpart.clone()));
    assert_eq!(finalized.dispute.votes.reject, 3);
    assert_eq!(
        coordinator.ballot_state(fixture.dispute_id, voter.address()),
        Some(BallotState::IncludedInTally)
    );

    let stored = fixture.ledger.get_dispute(fixture.dispute_id).await.unwrap();
    assert_eq!(stored.status, finalized.dispute.status);
    assert_eq!(stored.votes, finalized.dispute.votes);
}

#[tokio::test]
async fn only_the_maintainer_finalizes() {
    let fixture = setup().await;
    register_and_vote(&fixture, VoteChoice::Approve).await;
    fixture.ledger.set_time(VOTING_ENDS_AT);

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();

    let stranger = Ed25519Signer::generate();
    let err = ProofSubmitter::new(&coordinator, fast_policy())
        .finalize_report(&stranger, &report)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Authorization(AuthorizationError::NotMaintainer(_))
    ));

    let err = TEST_KEYS
        .publish(&fixture.ledger, &stranger, fixture.maintainer.address(), &fast_policy())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Authorization(AuthorizationError::NotMaintainer(_))
    ));
}

#[tokio::test]
async fn late_ballot_makes_tally_stale() {
    let fixture = setup().await;
    register_and_vote(&fixture, VoteChoice::Approve).await;

    // A tally taken while voting is still open misses the next ballot
    let early = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();
    register_and_vote(&fixture, VoteChoice::Reject).await;
    fixture.ledger.set_time(VOTING_ENDS_AT);

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let err = ProofSubmitter::new(&coordinator, fast_policy())
        .finalize_report(&fixture.maintainer, &early)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::State(StateError::StaleTally { missing: 1, .. })
    ));
}

#[tokio::test]
async fn confirmation_gives_up_after_the_cap() {
    let fixture = setup().await;
    let voter = Ed25519Signer::generate();
    let submitter = BallotSubmitter::new(&fixture.ledger, fast_policy());

    fixture.ledger.hold_transactions(u32::MAX);
    let err = submitter
        .register(&voter, fixture.dispute_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::ConfirmationTimeout { attempts: 3, .. })
    ));

    // A short hold resolves within the cap
    fixture.ledger.hold_transactions(2);
    let voter = Ed25519Signer::generate();
    submitter.register(&voter, fixture.dispute_id).await.unwrap();
}

#[tokio::test]
async fn concurrent_finalize_is_refused() {
    let fixture = setup().await;
    register_and_vote(&fixture, VoteChoice::Approve).await;
    fixture.ledger.set_time(VOTING_ENDS_AT);

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let report = tally_dispute(&fixture.ledger, fixture.dispute_id, &TEST_KEYS, RejectionPolicy::Strict)
        .await
        .unwrap();

    // Keep the first execute pending so the second attempt overlaps it
    fixture.ledger.hold_transactions(2);
    let submitter = ProofSubmitter::new(&coordinator, fast_policy());
    let (first, second) = tokio::join!(
        submitter.finalize_report(&fixture.maintainer, &report),
        submitter.finalize_report(&fixture.maintainer, &report),
    );

    assert_eq!(first.unwrap().dispute.status, DisputeStatus::Creator);
    assert!(matches!(
        second,
        Err(Error::State(StateError::FinalizeInFlight(_)))
    ));
}

#[tokio::test]
async fn disputes_are_listed_by_count() {
    let fixture = setup().await;
    fixture.ledger.create_dispute(
        PROJECT_ID,
        fixture.creator.clone(),
        fixture.counterpart.clone(),
        "second",
        VOTING_ENDS_AT,
    );

    let coordinator = DisputeLifecycleCoordinator::new(
        &fixture.ledger,
        CoordinatorConfig::new(fixture.maintainer.address().clone()),
    );
    let disputes = coordinator.list_disputes().await.unwrap();
    let ids: Vec<u32> = disputes.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
}
