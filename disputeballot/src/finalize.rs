use crate::*;

/// Result of a verified reveal
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Creator,
    Counterpart,
    NoWinner,
}

impl Outcome {
    /// Creator wins on more approvals than rejections, counterpart on more
    /// rejections than approvals. Anything else has no winner.
    pub fn from_tallies(tallies: &[u128; NUM_CHOICES]) -> Self {
        if tallies[0] > tallies[1] {
            Outcome::Creator
        } else if tallies[1] > tallies[0] {
            Outcome::Counterpart
        } else {
            Outcome::NoWinner
        }
    }

    pub fn status(self) -> DisputeStatus {
        match self {
            Outcome::Creator => DisputeStatus::Creator,
            Outcome::Counterpart => DisputeStatus::Counterpart,
            Outcome::NoWinner => DisputeStatus::Abstain,
        }
    }

    pub fn winner(self, dispute: &Dispute) -> Option<&Address> {
        match self {
            Outcome::Creator => Some(&dispute.creator),
            Outcome::Counterpart => Some(&dispute.counterpart),
            Outcome::NoWinner => None,
        }
    }
}

/// A successful finalize
#[derive(Clone, Debug)]
pub struct Finalized {
    pub hash: TxHash,
    /// The dispute as the ledger holds it after finalizing
    pub dispute: Dispute,
}

/// Reveals tallies to the ledger's verify-and-finalize entry point
pub struct ProofSubmitter<'a, L: Ledger + ?Sized> {
    coordinator: &'a DisputeLifecycleCoordinator<'a, L>,
    policy: ConfirmationPolicy,
    allow_incomplete: bool,
}

impl<'a, L: Ledger + ?Sized> ProofSubmitter<'a, L> {
    pub fn new(coordinator: &'a DisputeLifecycleCoordinator<'a, L>, policy: ConfirmationPolicy) -> Self {
        ProofSubmitter {
            coordinator,
            policy,
            allow_incomplete: false,
        }
    }

    /// Accept tally reports that excluded malformed ballots
    pub fn allow_incomplete(mut self, allow: bool) -> Self {
        self.allow_incomplete = allow;
        self
    }

    /// Finalize a dispute from a tally report, refusing stale or incomplete reports
    pub async fn finalize_report(
        &self,
        signer: &dyn TransactionSigner,
        report: &TallyReport,
    ) -> Result<Finalized, Error> {
        let dispute = self.coordinator.snapshot(report.dispute_id).await?;
        self.coordinator.ensure_tally_current(&dispute, report)?;

        if !report.is_complete() && !self.allow_incomplete {
            return Err(StateError::IncompleteTally {
                dispute_id: report.dispute_id,
                rejected: report.rejected.len(),
            }
            .into());
        }

        let finalized = self
            .finalize(signer, report.dispute_id, &report.reveal())
            .await?;
        self.coordinator.record_tally(report);
        Ok(finalized)
    }

    /// Reveal `tallies` and `seeds` for a dispute and wait for the ledger to
    /// finalize it.
    ///
    /// The ledger checks the reveal against the stored commitments and applies
    /// all of it or none of it.
    pub async fn finalize(
        &self,
        signer: &dyn TransactionSigner,
        dispute_id: u32,
        reveal: &Reveal,
    ) -> Result<Finalized, Error> {
        let maintainer = signer.address();
        if !self.coordinator.config().is_maintainer(maintainer) {
            return Err(AuthorizationError::NotMaintainer(maintainer.clone()).into());
        }

        let _guard = self.coordinator.begin_finalize(dispute_id)?;

        let ledger = self.coordinator.ledger();
        let dispute = self.coordinator.snapshot(dispute_id).await?;
        let now = ledger.timestamp().await?;
        self.coordinator.can_finalize(&dispute, maintainer, now)?;

        if !ledger.proof(dispute_id, reveal).await? {
            warn!("dispute {}: reveal does not match stored commitments", dispute_id);
            return Err(LedgerError::ProofRejected.into());
        }

        let call = LedgerCall::Execute {
            maintainer: maintainer.clone(),
            project_id: dispute.project_id,
            dispute_id,
            reveal: Some(reveal.clone()),
        };
        let hash = submit_and_confirm(ledger, signer, call, &self.policy).await?;

        // Confirmed already, so fall back to what the execute applied
        let dispute = match self.coordinator.snapshot(dispute_id).await {
            Ok(dispute) => dispute,
            Err(e) => {
                warn!(
                    "dispute {}: finalized in {} but could not re-read it: {}",
                    dispute_id, hash, e
                );
                settled(dispute, reveal)
            }
        };
        info!(
            "dispute {} finalized as {} in {}",
            dispute_id, dispute.status, hash
        );
        Ok(Finalized { hash, dispute })
    }
}

/// The dispute as a confirmed execute of `reveal` leaves it
fn settled(mut dispute: Dispute, reveal: &Reveal) -> Dispute {
    let outcome = Outcome::from_tallies(&reveal.tallies);
    dispute.winner = outcome.winner(&dispute).cloned();
    dispute.status = outcome.status();
    dispute.votes = VoteCounts::from(reveal.tallies);
    dispute
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_policy() {
        assert_eq!(Outcome::from_tallies(&[6, 0, 0]), Outcome::Creator);
        assert_eq!(Outcome::from_tallies(&[1, 4, 9]), Outcome::Counterpart);
        assert_eq!(Outcome::from_tallies(&[2, 2, 0]), Outcome::NoWinner);
        assert_eq!(Outcome::from_tallies(&[0, 0, 5]), Outcome::NoWinner);
        assert_eq!(Outcome::NoWinner.status(), DisputeStatus::Abstain);
    }
}
