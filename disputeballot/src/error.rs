use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("disputeballot: validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("disputeballot: crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("disputeballot: commitment oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("disputeballot: ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("disputeballot: not authorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("disputeballot: invalid state: {0}")]
    State(#[from] StateError),

    #[error("disputeballot: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("disputeballot: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("disputeballot: weighted sum does not fit in 128 bits")]
    ArithmeticOverflow,
}

/// Malformed caller input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid address {0:?}: {1}")]
    InvalidAddress(String, &'static str),

    #[error("required field {0} is empty")]
    EmptyField(&'static str),

    #[error("no vote choice selected")]
    NoChoiceSelected,

    #[error("invalid vote choice {0}")]
    InvalidChoice(String),

    #[error("expected {expected} values, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("ballot weight must be at least 1")]
    ZeroWeight,
}

/// Key handling and encryption failures
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("key generation failed: {0}")]
    KeyGeneration(rsa::Error),

    #[error("key import failed: {0}")]
    KeyImport(String),

    #[error("key export failed: {0}")]
    KeyExport(String),

    #[error("invalid key file: {0}")]
    InvalidKeyFile(String),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("malformed plaintext in {slot} slot: {found:?}")]
    MalformedPlaintext { slot: &'static str, found: String },

    #[error("vote vector {0:?} is not one-hot")]
    NotOneHot([u128; 3]),

    #[error("signature error: {0}")]
    Signature(#[from] ed25519_dalek::SignatureError),
}

/// The ledger's commitment-construction oracle could not be used
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("commitment request failed: {0}")]
    CommitmentRequest(String),

    #[error("oracle returned {0} commitments, expected 3")]
    WrongCommitmentCount(usize),
}

/// Failures talking to (or rejected by) the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("simulation of {method} failed: {reason}")]
    Simulation { method: String, reason: String },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("transaction {hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { hash: TxHash, attempts: u32 },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("dispute {0} not found")]
    DisputeNotFound(u32),

    #[error("no anonymous voting config for project {0}")]
    NoVotingConfig(u32),

    #[error("revealed tallies do not match the stored commitments")]
    ProofRejected,

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Caller lacks the identity the operation needs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("{0} is not the maintainer")]
    NotMaintainer(Address),

    #[error("{voter} is not registered to vote on dispute {dispute_id}")]
    NotRegistered { voter: Address, dispute_id: u32 },

    #[error("{0} is a party to the dispute and cannot vote on it")]
    PartyCannotVote(Address),

    #[error("transaction signed by {signer} on behalf of {caller}")]
    SignerMismatch { signer: Address, caller: Address },
}

/// Operation not legal in the dispute's current lifecycle state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("{voter} already voted on dispute {dispute_id}")]
    AlreadyVoted { voter: Address, dispute_id: u32 },

    #[error("{voter} is already registered for dispute {dispute_id}")]
    AlreadyRegistered { voter: Address, dispute_id: u32 },

    #[error("voting on dispute {0} is closed")]
    VotingClosed(u32),

    #[error("voting on dispute {0} is still open")]
    VotingStillOpen(u32),

    #[error("dispute {dispute_id} has {found} votes, {needed} needed")]
    BelowMinimumVotes {
        dispute_id: u32,
        needed: usize,
        found: usize,
    },

    #[error("dispute {0} is already finalized")]
    AlreadyFinalized(u32),

    #[error("a finalize attempt for dispute {0} is already in flight")]
    FinalizeInFlight(u32),

    #[error("tally for dispute {dispute_id} is missing {missing} stored ballots")]
    StaleTally { dispute_id: u32, missing: usize },

    #[error("tally for dispute {dispute_id} names {unknown} voters with no stored ballot")]
    UnknownBallots { dispute_id: u32, unknown: usize },

    #[error("tally for dispute {dispute_id} excluded {rejected} ballots")]
    IncompleteTally { dispute_id: u32, rejected: usize },

    #[error("tally was computed for dispute {tallied}, not {requested}")]
    TallyDisputeMismatch { tallied: u32, requested: u32 },
}
