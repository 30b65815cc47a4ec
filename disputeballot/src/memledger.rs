use crate::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Most ballots a single dispute accepts
pub const MAX_BALLOTS_PER_DISPUTE: usize = 1000;

/// Largest weight a registration may carry
pub const MAX_WEIGHT: u32 = 100;

/// Weight given to new registrations unless changed with `set_registration_weight`
pub const DEFAULT_WEIGHT: u32 = 3;

// Stand-in commitment group: integers modulo the Mersenne prime 2^61 - 1.
// C(v, s) = v*G + s*H is additively homomorphic like the ledger's curve commitment,
// so weighted aggregates verify the same way. It is not hiding and is for testing only.
const MODULUS: u64 = (1 << 61) - 1;
const VOTE_GENERATOR: u64 = 0x1d1f_6a3c_9e27_b5;
const SEED_GENERATOR: u64 = 0x0b7e_1516_28ae_d2a6;

fn reduce(value: u128) -> u128 {
    value % MODULUS as u128
}

fn commit(vote: u128, seed: u128) -> u64 {
    let m = MODULUS as u128;
    let v = reduce(vote) * VOTE_GENERATOR as u128 % m;
    let s = reduce(seed) * SEED_GENERATOR as u128 % m;
    ((v + s) % m) as u64
}

fn commitment_value(commitment: &Commitment) -> Option<u64> {
    let bytes: [u8; 8] = commitment.0.as_slice().try_into().ok()?;
    let value = u64::from_be_bytes(bytes);
    if value < MODULUS {
        Some(value)
    } else {
        None
    }
}

// Σ w·C over all ballots must equal C(tally, seed) for every choice
fn aggregate_matches(ballots: &[Ballot], reveal: &Reveal) -> bool {
    let m = MODULUS as u128;
    for i in 0..NUM_CHOICES {
        let mut sum: u128 = 0;
        for ballot in ballots {
            let value = match commitment_value(&ballot.commitments[i]) {
                Some(value) => value as u128,
                None => return false,
            };
            sum = (sum + value * ballot.weight as u128 % m) % m;
        }
        if sum != commit(reveal.tallies[i], reveal.seeds[i]) as u128 {
            return false;
        }
    }
    true
}

struct QueuedTx {
    call: SignedCall,
    polls_left: u32,
}

struct State {
    maintainer: Address,
    disputes: BTreeMap<u32, Dispute>,
    configs: BTreeMap<u32, AnonymousVotingConfig>,
    queued: HashMap<TxHash, QueuedTx>,
    receipts: HashMap<TxHash, TxReceipt>,
    tx_count: u64,
    registration_weight: u32,
    hold_polls: u32,
    clock: Option<u64>,
    oracle_offline: bool,
}

impl State {
    fn now(&self) -> u64 {
        self.clock.unwrap_or_else(unix_now)
    }

    fn dispute_mut(&mut self, dispute_id: u32) -> Result<&mut Dispute, String> {
        self.disputes
            .get_mut(&dispute_id)
            .ok_or_else(|| format!("dispute {} not found", dispute_id))
    }

    // Validate and apply a call. On error nothing has been changed.
    fn apply(&mut self, call: &LedgerCall) -> Result<(), String> {
        let now = self.now();
        match call {
            LedgerCall::AnonymousVotingSetup {
                maintainer,
                project_id,
                public_key,
            } => {
                if maintainer != &self.maintainer {
                    return Err("not authorized".to_owned());
                }
                VotingPublicKey::from_base64(public_key).map_err(|e| e.to_string())?;
                self.configs.insert(
                    *project_id,
                    AnonymousVotingConfig {
                        project_id: *project_id,
                        public_key: public_key.clone(),
                    },
                );
            }

            LedgerCall::RegisterToVote { voter, dispute_id } => {
                let weight = self.registration_weight;
                let dispute = self.dispute_mut(*dispute_id)?;
                if dispute.status != DisputeStatus::Open {
                    return Err("invalid dispute status".to_owned());
                }
                if dispute.is_party(voter) {
                    return Err("not authorized".to_owned());
                }
                if dispute.registration(voter).is_some() {
                    return Err("already registered".to_owned());
                }
                dispute.registered.push(RegisteredVoter {
                    address: voter.clone(),
                    weight,
                });
            }

            LedgerCall::Vote {
                voter,
                dispute_id,
                ballot,
            } => {
                let dispute = self.dispute_mut(*dispute_id)?;
                if dispute.status != DisputeStatus::Open {
                    return Err("dispute not open".to_owned());
                }
                if dispute.voting_closed(now) {
                    return Err("voting period has ended".to_owned());
                }
                if dispute.ballots.len() >= MAX_BALLOTS_PER_DISPUTE {
                    return Err("vote limit exceeded".to_owned());
                }
                if &ballot.address != voter {
                    return Err("wrong voter".to_owned());
                }
                let registered = dispute
                    .registration(voter)
                    .ok_or_else(|| "not allowed to vote".to_owned())?;
                if ballot.weight != registered.weight || ballot.weight > MAX_WEIGHT {
                    return Err("invalid voter weight".to_owned());
                }
                if dispute.has_voted(voter) {
                    return Err("already voted".to_owned());
                }
                if ballot.commitments.iter().any(|c| commitment_value(c).is_none()) {
                    return Err("bad commitment".to_owned());
                }
                dispute.ballots.push(ballot.clone());
            }

            LedgerCall::Execute {
                maintainer,
                project_id,
                dispute_id,
                reveal,
            } => {
                if maintainer != &self.maintainer {
                    return Err("not authorized".to_owned());
                }
                let dispute = self.dispute_mut(*dispute_id)?;
                if dispute.project_id != *project_id {
                    return Err("dispute belongs to another project".to_owned());
                }
                if dispute.status.is_finalized() {
                    return Err("dispute already resolved".to_owned());
                }
                if !dispute.voting_closed(now) {
                    return Err("voting period has not ended".to_owned());
                }

                let reveal = match reveal {
                    Some(reveal) => reveal.clone(),
                    None if dispute.ballots.is_empty() => Reveal {
                        tallies: [0; NUM_CHOICES],
                        seeds: [0; NUM_CHOICES],
                    },
                    None => return Err("tallies and seeds required".to_owned()),
                };
                if !aggregate_matches(&dispute.ballots, &reveal) {
                    return Err("invalid reveal".to_owned());
                }

                let outcome = Outcome::from_tallies(&reveal.tallies);
                dispute.status = outcome.status();
                dispute.winner = outcome.winner(dispute).cloned();
                dispute.votes = VoteCounts::from(reveal.tallies);
            }
        }
        Ok(())
    }
}

/// An in-process ledger that enforces the dispute contract's rules.
///
/// Transactions are verified and applied atomically. Use `hold_transactions` to
/// keep new transactions pending for a number of status polls.
pub struct MemLedger {
    state: Mutex<State>,
}

impl MemLedger {
    pub fn new(maintainer: Address) -> Self {
        MemLedger {
            state: Mutex::new(State {
                maintainer,
                disputes: BTreeMap::new(),
                configs: BTreeMap::new(),
                queued: HashMap::new(),
                receipts: HashMap::new(),
                tx_count: 0,
                registration_weight: DEFAULT_WEIGHT,
                hold_polls: 0,
                clock: None,
                oracle_offline: false,
            }),
        }
    }

    /// Open a new dispute and return its id. Ids start at 1.
    pub fn create_dispute(
        &self,
        project_id: u32,
        creator: Address,
        counterpart: Address,
        proof: &str,
        voting_ends_at: u64,
    ) -> u32 {
        let mut state = self.state.lock();
        let id = state.disputes.len() as u32 + 1;
        state.disputes.insert(
            id,
            Dispute {
                id,
                project_id,
                creator,
                counterpart,
                proof: proof.to_owned(),
                voting_ends_at,
                status: DisputeStatus::Open,
                winner: None,
                votes: VoteCounts::default(),
                registered: vec![],
                ballots: vec![],
            },
        );
        debug!("memledger: created dispute {}", id);
        id
    }

    /// Pin the ledger clock to `now` (unix seconds)
    pub fn set_time(&self, now: u64) {
        self.state.lock().clock = Some(now);
    }

    pub fn set_registration_weight(&self, weight: u32) {
        self.state.lock().registration_weight = weight.min(MAX_WEIGHT);
    }

    /// Keep transactions sent from now on pending for `polls` status polls
    pub fn hold_transactions(&self, polls: u32) {
        self.state.lock().hold_polls = polls;
    }

    /// Make the commitment oracle fail
    pub fn set_oracle_offline(&self, offline: bool) {
        self.state.lock().oracle_offline = offline;
    }

    fn next_hash(state: &mut State, call: &SignedCall) -> TxHash {
        state.tx_count += 1;
        let mut hasher = Sha256::new();
        hasher.update(state.tx_count.to_be_bytes());
        hasher.update(call.nonce.as_bytes());
        hasher.update(&call.signature);
        TxHash(hex::encode(hasher.finalize()))
    }

    fn settle(state: &mut State, hash: &TxHash, call: &SignedCall) -> TxReceipt {
        match state.apply(&call.call) {
            Ok(()) => {
                debug!("memledger: {} applied in {}", call.call.method(), hash);
                TxReceipt {
                    status: TxStatus::Success,
                    error: None,
                }
            }
            Err(reason) => {
                debug!("memledger: {} failed: {}", call.call.method(), reason);
                TxReceipt {
                    status: TxStatus::Failed,
                    error: Some(reason),
                }
            }
        }
    }
}

#[async_trait]
impl CommitmentOracle for MemLedger {
    async fn build_commitments(
        &self,
        project_id: u32,
        votes: &[u128; NUM_CHOICES],
        seeds: &[u128; NUM_CHOICES],
    ) -> Result<Vec<Commitment>, OracleError> {
        let state = self.state.lock();
        if state.oracle_offline {
            return Err(OracleError::CommitmentRequest(
                "oracle unavailable".to_owned(),
            ));
        }
        if !state.configs.contains_key(&project_id) {
            return Err(OracleError::CommitmentRequest(format!(
                "no anonymous voting config for project {}",
                project_id
            )));
        }

        Ok(votes
            .iter()
            .zip(seeds.iter())
            .map(|(vote, seed)| Commitment(commit(*vote, *seed).to_be_bytes().to_vec()))
            .collect())
    }
}

#[async_trait]
impl Ledger for MemLedger {
    async fn get_dispute(&self, dispute_id: u32) -> Result<Dispute, LedgerError> {
        self.state
            .lock()
            .disputes
            .get(&dispute_id)
            .cloned()
            .ok_or(LedgerError::DisputeNotFound(dispute_id))
    }

    async fn get_anonymous_voting_config(
        &self,
        project_id: u32,
    ) -> Result<AnonymousVotingConfig, LedgerError> {
        self.state
            .lock()
            .configs
            .get(&project_id)
            .cloned()
            .ok_or(LedgerError::NoVotingConfig(project_id))
    }

    async fn get_dispute_count(&self) -> Result<u32, LedgerError> {
        Ok(self.state.lock().disputes.len() as u32)
    }

    async fn timestamp(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().now())
    }

    async fn proof(&self, dispute_id: u32, reveal: &Reveal) -> Result<bool, LedgerError> {
        let state = self.state.lock();
        let dispute = state
            .disputes
            .get(&dispute_id)
            .ok_or(LedgerError::DisputeNotFound(dispute_id))?;
        Ok(aggregate_matches(&dispute.ballots, reveal))
    }

    async fn send_transaction(&self, call: SignedCall) -> Result<Submission, LedgerError> {
        let mut state = self.state.lock();
        let hash = MemLedger::next_hash(&mut state, &call);

        if let Err(e) = call.verify_signature() {
            return Ok(Submission {
                hash,
                status: TxStatus::Failed,
                error: Some(e.to_string()),
            });
        }

        if state.hold_polls > 0 {
            let polls_left = state.hold_polls;
            state.queued.insert(hash.clone(), QueuedTx { call, polls_left });
            return Ok(Submission {
                hash,
                status: TxStatus::Pending,
                error: None,
            });
        }

        let receipt = MemLedger::settle(&mut state, &hash, &call);
        state.receipts.insert(hash.clone(), receipt.clone());
        Ok(Submission {
            hash,
            status: receipt.status,
            error: receipt.error,
        })
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock();

        if let Some(receipt) = state.receipts.get(hash) {
            return Ok(receipt.clone());
        }

        let queued = state
            .queued
            .get_mut(hash)
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("unknown transaction {}", hash)))?;
        queued.polls_left -= 1;
        if queued.polls_left > 0 {
            return Ok(TxReceipt {
                status: TxStatus::Pending,
                error: None,
            });
        }

        let queued = state
            .queued
            .remove(hash)
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("unknown transaction {}", hash)))?;
        let receipt = MemLedger::settle(&mut state, hash, &queued.call);
        state.receipts.insert(hash.clone(), receipt.clone());
        Ok(receipt)
    }
}
