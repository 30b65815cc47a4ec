use crate::*;

/// Ledger-side status of a dispute
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DisputeStatus {
    Open,
    /// Finalized in favour of the creator
    Creator,
    /// Finalized in favour of the counterpart
    Counterpart,
    /// Finalized with no winner
    Abstain,
}

impl DisputeStatus {
    pub fn is_finalized(self) -> bool {
        self != DisputeStatus::Open
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Creator => "creator",
            DisputeStatus::Counterpart => "counterpart",
            DisputeStatus::Abstain => "abstain",
        };
        f.write_str(name)
    }
}

/// Weighted per-choice totals, set by the ledger when a dispute is finalized
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteCounts {
    #[serde(with = "u128_string")]
    pub approve: u128,
    #[serde(with = "u128_string")]
    pub reject: u128,
    #[serde(with = "u128_string")]
    pub abstain: u128,
}

impl From<[u128; NUM_CHOICES]> for VoteCounts {
    fn from(tallies: [u128; NUM_CHOICES]) -> Self {
        VoteCounts {
            approve: tallies[0],
            reject: tallies[1],
            abstain: tallies[2],
        }
    }
}

/// A voter registered for a dispute, with the weight the ledger assigned at registration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegisteredVoter {
    pub address: Address,
    pub weight: u32,
}

/// Snapshot of a dispute as read from the ledger
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Dispute {
    pub id: u32,
    pub project_id: u32,
    pub creator: Address,
    pub counterpart: Address,
    pub proof: String,

    /// Unix timestamp (seconds) at which voting closes
    pub voting_ends_at: u64,
    pub status: DisputeStatus,

    #[serde(default)]
    pub winner: Option<Address>,

    #[serde(default)]
    pub votes: VoteCounts,

    #[serde(default)]
    pub registered: Vec<RegisteredVoter>,

    #[serde(default)]
    pub ballots: Vec<Ballot>,
}

impl Dispute {
    pub fn registration(&self, voter: &Address) -> Option<&RegisteredVoter> {
        self.registered.iter().find(|r| &r.address == voter)
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.ballots.iter().any(|b| &b.address == voter)
    }

    pub fn is_party(&self, address: &Address) -> bool {
        &self.creator == address || &self.counterpart == address
    }

    /// Whether the voting window has closed at `now` (unix seconds)
    pub fn voting_closed(&self, now: u64) -> bool {
        now >= self.voting_ends_at
    }
}

/// A project's published ballot encryption key
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnonymousVotingConfig {
    pub project_id: u32,
    /// Base64 DER SubjectPublicKeyInfo
    pub public_key: String,
}

impl AnonymousVotingConfig {
    pub fn voting_key(&self) -> Result<VotingPublicKey, CryptoError> {
        VotingPublicKey::from_base64(&self.public_key)
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    let now = chrono::Utc::now().timestamp();
    if now < 0 {
        0
    } else {
        now as u64
    }
}
