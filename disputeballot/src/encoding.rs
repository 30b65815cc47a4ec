use crate::*;
use num_enum::TryFromPrimitive;
use rand_core::{CryptoRng, RngCore};
use std::convert::TryFrom;
use std::str::FromStr;

/// Number of vote slots: approve, reject, abstain
pub const NUM_CHOICES: usize = 3;

/// A vote choice, by slot index
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum VoteChoice {
    /// Decide for the dispute creator
    Approve = 0,
    /// Decide for the counterpart
    Reject = 1,
    Abstain = 2,
}

impl VoteChoice {
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-hot vote vector for this choice
    pub fn one_hot(self) -> [u128; NUM_CHOICES] {
        let mut votes = [0; NUM_CHOICES];
        votes[self.index()] = 1;
        votes
    }

    /// Choice from an optional UI index. `None` means nothing was selected.
    pub fn from_index(index: Option<u8>) -> Result<Self, ValidationError> {
        let index = index.ok_or(ValidationError::NoChoiceSelected)?;
        VoteChoice::try_from(index).map_err(|_| ValidationError::InvalidChoice(index.to_string()))
    }
}

impl FromStr for VoteChoice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(ValidationError::NoChoiceSelected),
            "approve" | "0" => Ok(VoteChoice::Approve),
            "reject" | "1" => Ok(VoteChoice::Reject),
            "abstain" | "2" => Ok(VoteChoice::Abstain),
            _ => Err(ValidationError::InvalidChoice(s.to_owned())),
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            VoteChoice::Approve => "approve",
            VoteChoice::Reject => "reject",
            VoteChoice::Abstain => "abstain",
        };
        f.write_str(name)
    }
}

/// Plaintext tag that distinguishes vote slots from seed slots
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Vote,
    Seed,
}

impl Tag {
    fn prefix(self) -> &'static str {
        match self {
            Tag::Vote => "vote:",
            Tag::Seed => "seed:",
        }
    }

    fn slot(self) -> &'static str {
        match self {
            Tag::Vote => "vote",
            Tag::Seed => "seed",
        }
    }
}

/// Plaintext for one slot, e.g. `vote:1` or `seed:8213`
pub fn encode_tagged(tag: Tag, value: u128) -> String {
    format!("{}{}", tag.prefix(), value)
}

/// Parse a decrypted slot plaintext, which must carry the expected tag and
/// a non-negative integer.
pub fn decode_tagged(tag: Tag, plaintext: &[u8]) -> Result<u128, CryptoError> {
    let malformed = || CryptoError::MalformedPlaintext {
        slot: tag.slot(),
        found: String::from_utf8_lossy(plaintext).into_owned(),
    };

    let text = std::str::from_utf8(plaintext).map_err(|_| malformed())?;
    let digits = text.strip_prefix(tag.prefix()).ok_or_else(malformed)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse().map_err(|_| malformed())
}

/// One-hot vote vector for a choice index
pub fn encode_choice(choice: VoteChoice) -> [u128; NUM_CHOICES] {
    choice.one_hot()
}

/// A single RSA-OAEP ciphertext, base64 on the wire
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Ciphertext(#[serde(with = "base64_bytes")] pub Vec<u8>);

impl Ciphertext {
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }
}

/// Plaintext vote and seed vectors with their slot-by-slot encryptions.
///
/// The plaintext halves leave this struct only to build commitments. They are
/// never stored.
#[derive(Clone, Debug)]
pub struct SealedVote {
    pub choice: VoteChoice,
    pub votes: [u128; NUM_CHOICES],
    pub seeds: [u128; NUM_CHOICES],
    pub encrypted_votes: [Ciphertext; NUM_CHOICES],
    pub encrypted_seeds: [Ciphertext; NUM_CHOICES],
}

/// Encodes a choice and encrypts each slot under the published voting key
pub struct VoteEncoder<'a> {
    public_key: &'a VotingPublicKey,
}

impl<'a> VoteEncoder<'a> {
    pub fn new(public_key: &'a VotingPublicKey) -> Self {
        VoteEncoder { public_key }
    }

    /// Seal a choice with fresh seeds from the operating system RNG
    pub fn seal(&self, choice: VoteChoice) -> Result<SealedVote, CryptoError> {
        self.seal_with_rng(choice, &mut rand::rngs::OsRng)
    }

    pub fn seal_with_rng<R: CryptoRng + RngCore>(
        &self,
        choice: VoteChoice,
        rng: &mut R,
    ) -> Result<SealedVote, CryptoError> {
        let votes = choice.one_hot();
        let seeds = [
            rng.next_u64() as u128,
            rng.next_u64() as u128,
            rng.next_u64() as u128,
        ];

        let encrypted_votes = self.encrypt_slots(rng, Tag::Vote, &votes)?;
        let encrypted_seeds = self.encrypt_slots(rng, Tag::Seed, &seeds)?;

        Ok(SealedVote {
            choice,
            votes,
            seeds,
            encrypted_votes,
            encrypted_seeds,
        })
    }

    fn encrypt_slots<R: CryptoRng + RngCore>(
        &self,
        rng: &mut R,
        tag: Tag,
        values: &[u128; NUM_CHOICES],
    ) -> Result<[Ciphertext; NUM_CHOICES], CryptoError> {
        Ok([
            self.public_key.encrypt(rng, encode_tagged(tag, values[0]).as_bytes())?,
            self.public_key.encrypt(rng, encode_tagged(tag, values[1]).as_bytes())?,
            self.public_key.encrypt(rng, encode_tagged(tag, values[2]).as_bytes())?,
        ])
    }
}
