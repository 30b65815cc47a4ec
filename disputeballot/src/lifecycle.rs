use crate::*;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Local projection of a dispute's lifecycle
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Accepting registrations and ballots
    Open,
    /// Voting window closed, waiting for the maintainer to reveal and finalize
    AwaitingExecution,
    /// Terminal
    Finalized,
}

impl LifecycleState {
    pub fn of(dispute: &Dispute, now: u64) -> Self {
        if dispute.status.is_finalized() {
            LifecycleState::Finalized
        } else if dispute.voting_closed(now) {
            LifecycleState::AwaitingExecution
        } else {
            LifecycleState::Open
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Open => "open",
            LifecycleState::AwaitingExecution => "awaiting execution",
            LifecycleState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Where a ballot is, as far as this process has seen
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BallotState {
    /// Sent to the ledger
    Cast,
    /// Seen in a ledger snapshot
    Stored,
    /// Counted in a tally that was submitted
    IncludedInTally,
}

/// Deployment settings for the coordinator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// The one address allowed to publish voting keys and finalize disputes.
    /// `None` for a coordinator that only reads.
    pub maintainer: Option<Address>,
    /// Fewest stored ballots a dispute needs before it can be finalized
    pub min_votes: usize,
}

impl CoordinatorConfig {
    pub fn new(maintainer: Address) -> Self {
        CoordinatorConfig {
            maintainer: Some(maintainer),
            min_votes: 1,
        }
    }

    /// Settings for snapshots and listings. Nobody may finalize through it.
    pub fn read_only() -> Self {
        CoordinatorConfig {
            maintainer: None,
            min_votes: 1,
        }
    }

    pub fn is_maintainer(&self, address: &Address) -> bool {
        self.maintainer.as_ref() == Some(address)
    }
}

/// Derives dispute lifecycle state from ledger snapshots and decides which
/// operations are currently legal.
pub struct DisputeLifecycleCoordinator<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    config: CoordinatorConfig,
    ballots: Mutex<HashMap<(u32, Address), BallotState>>,
    finalizing: Mutex<HashSet<u32>>,
}

impl<'a, L: Ledger + ?Sized> DisputeLifecycleCoordinator<'a, L> {
    pub fn new(ledger: &'a L, config: CoordinatorConfig) -> Self {
        DisputeLifecycleCoordinator {
            ledger,
            config,
            ballots: Mutex::new(HashMap::new()),
            finalizing: Mutex::new(HashSet::new()),
        }
    }

    pub fn ledger(&self) -> &'a L {
        self.ledger
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Read a dispute and note every ballot it holds as stored
    pub async fn snapshot(&self, dispute_id: u32) -> Result<Dispute, Error> {
        let dispute = self.ledger.get_dispute(dispute_id).await?;

        let mut ballots = self.ballots.lock();
        for ballot in &dispute.ballots {
            let state = ballots
                .entry((dispute_id, ballot.address.clone()))
                .or_insert(BallotState::Stored);
            if *state == BallotState::Cast {
                *state = BallotState::Stored;
            }
        }
        drop(ballots);

        Ok(dispute)
    }

    pub async fn state(&self, dispute_id: u32) -> Result<LifecycleState, Error> {
        let dispute = self.snapshot(dispute_id).await?;
        let now = self.ledger.timestamp().await?;
        Ok(LifecycleState::of(&dispute, now))
    }

    /// Returns the voter's weight if they may cast a ballot now
    pub fn can_vote(&self, dispute: &Dispute, voter: &Address, now: u64) -> Result<u32, Error> {
        check_eligibility(dispute, voter, now)
    }

    /// Check that `caller` may finalize `dispute` at `now`
    pub fn can_finalize(&self, dispute: &Dispute, caller: &Address, now: u64) -> Result<(), Error> {
        if !self.config.is_maintainer(caller) {
            return Err(AuthorizationError::NotMaintainer(caller.clone()).into());
        }

        match LifecycleState::of(dispute, now) {
            LifecycleState::Finalized => Err(StateError::AlreadyFinalized(dispute.id).into()),
            LifecycleState::Open => Err(StateError::VotingStillOpen(dispute.id).into()),
            LifecycleState::AwaitingExecution => {
                if dispute.ballots.len() < self.config.min_votes {
                    return Err(StateError::BelowMinimumVotes {
                        dispute_id: dispute.id,
                        needed: self.config.min_votes,
                        found: dispute.ballots.len(),
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    pub fn record_cast(&self, dispute_id: u32, voter: &Address) {
        self.ballots
            .lock()
            .entry((dispute_id, voter.clone()))
            .or_insert(BallotState::Cast);
    }

    /// Mark the report's ballots as consumed by a submitted tally
    pub fn record_tally(&self, report: &TallyReport) {
        let mut ballots = self.ballots.lock();
        for voter in &report.included {
            ballots.insert(
                (report.dispute_id, voter.clone()),
                BallotState::IncludedInTally,
            );
        }
    }

    pub fn ballot_state(&self, dispute_id: u32, voter: &Address) -> Option<BallotState> {
        self.ballots.lock().get(&(dispute_id, voter.clone())).copied()
    }

    /// Refuse a report unless it was computed for this dispute over exactly the
    /// ballots in the snapshot.
    pub fn ensure_tally_current(
        &self,
        dispute: &Dispute,
        report: &TallyReport,
    ) -> Result<(), StateError> {
        if report.dispute_id != dispute.id {
            return Err(StateError::TallyDisputeMismatch {
                tallied: report.dispute_id,
                requested: dispute.id,
            });
        }

        let seen: HashSet<&Address> = report
            .included
            .iter()
            .chain(report.rejected.iter().map(|r| &r.voter))
            .collect();
        let missing = dispute
            .ballots
            .iter()
            .filter(|b| !seen.contains(&b.address))
            .count();

        if missing > 0 {
            return Err(StateError::StaleTally {
                dispute_id: dispute.id,
                missing,
            });
        }

        let stored: HashSet<&Address> = dispute.ballots.iter().map(|b| &b.address).collect();
        let unknown = seen.iter().filter(|voter| !stored.contains(*voter)).count();
        if unknown > 0 {
            return Err(StateError::UnknownBallots {
                dispute_id: dispute.id,
                unknown,
            });
        }
        Ok(())
    }

    /// Claim the right to finalize a dispute until the guard is dropped
    pub fn begin_finalize(&self, dispute_id: u32) -> Result<FinalizeGuard<'_>, StateError> {
        let mut finalizing = self.finalizing.lock();
        if !finalizing.insert(dispute_id) {
            return Err(StateError::FinalizeInFlight(dispute_id));
        }
        Ok(FinalizeGuard {
            finalizing: &self.finalizing,
            dispute_id,
        })
    }

    /// Every dispute the ledger knows about, by its dispute count
    pub async fn list_disputes(&self) -> Result<Vec<Dispute>, Error> {
        let count = self.ledger.get_dispute_count().await?;
        let mut disputes = Vec::with_capacity(count as usize);
        for dispute_id in 1..=count {
            disputes.push(self.snapshot(dispute_id).await?);
        }
        Ok(disputes)
    }
}

/// Holds a dispute's finalize slot
pub struct FinalizeGuard<'c> {
    finalizing: &'c Mutex<HashSet<u32>>,
    dispute_id: u32,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        self.finalizing.lock().remove(&self.dispute_id);
    }
}
