use crate::*;
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use uuid::Uuid;

/// Ledger-assigned transaction hash
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Revealed aggregate tallies and seed sums for `execute`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Reveal {
    #[serde(with = "u128_triple")]
    pub tallies: [u128; NUM_CHOICES],
    #[serde(with = "u128_triple")]
    pub seeds: [u128; NUM_CHOICES],
}

/// A state-changing ledger entry point. Each one must be signed by its caller.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "method")]
#[serde(rename_all = "snake_case")]
pub enum LedgerCall {
    AnonymousVotingSetup {
        maintainer: Address,
        project_id: u32,
        public_key: String,
    },
    RegisterToVote {
        voter: Address,
        dispute_id: u32,
    },
    Vote {
        voter: Address,
        dispute_id: u32,
        ballot: Ballot,
    },
    Execute {
        maintainer: Address,
        project_id: u32,
        dispute_id: u32,
        reveal: Option<Reveal>,
    },
}

impl LedgerCall {
    /// The address that must sign this call
    pub fn caller(&self) -> &Address {
        match self {
            LedgerCall::AnonymousVotingSetup { maintainer, .. } => maintainer,
            LedgerCall::RegisterToVote { voter, .. } => voter,
            LedgerCall::Vote { voter, .. } => voter,
            LedgerCall::Execute { maintainer, .. } => maintainer,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            LedgerCall::AnonymousVotingSetup { .. } => "anonymous_voting_setup",
            LedgerCall::RegisterToVote { .. } => "register_to_vote",
            LedgerCall::Vote { .. } => "vote",
            LedgerCall::Execute { .. } => "execute",
        }
    }
}

/// Something that can authorize ledger calls for one address
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> &Address;

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Local ed25519 signing key for an account address
pub struct Ed25519Signer {
    key: SigningKey,
    address: Address,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        let address = Address::from_ed25519(&key.verifying_key().to_bytes());
        Ed25519Signer { key, address }
    }

    pub fn generate() -> Self {
        Ed25519Signer::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Load from a 32 byte secret key in hex
    pub fn from_secret_hex(secret: &str) -> Result<Self, Error> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| LedgerError::Signing(format!("secret key is not hex: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::Signing("secret key must be 32 bytes".to_owned()))?;
        Ok(Ed25519Signer::new(SigningKey::from_bytes(&bytes)))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

#[async_trait]
impl TransactionSigner for Ed25519Signer {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

/// A ledger call with its caller's signature
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedCall {
    pub call: LedgerCall,
    pub signer: Address,
    pub nonce: Uuid,

    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignedCall {
    /// Sign a call. The signer must be the call's caller.
    pub async fn sign(signer: &dyn TransactionSigner, call: LedgerCall) -> Result<Self, Error> {
        if signer.address() != call.caller() {
            return Err(AuthorizationError::SignerMismatch {
                signer: signer.address().clone(),
                caller: call.caller().clone(),
            }
            .into());
        }

        let nonce = Uuid::new_v4();
        let message = signing_bytes(&call, signer.address(), &nonce)?;
        let signature = signer.sign(&message).await?;

        Ok(SignedCall {
            call,
            signer: signer.address().clone(),
            nonce,
            signature,
        })
    }

    /// Check the signer is the caller and the signature is theirs
    pub fn verify_signature(&self) -> Result<(), Error> {
        if &self.signer != self.call.caller() {
            return Err(AuthorizationError::SignerMismatch {
                signer: self.signer.clone(),
                caller: self.call.caller().clone(),
            }
            .into());
        }

        let key = self
            .signer
            .ed25519_key()
            .ok_or_else(|| LedgerError::Signing(format!("{} cannot sign", self.signer)))?;
        let key = VerifyingKey::from_bytes(&key).map_err(CryptoError::Signature)?;
        let signature = Signature::from_slice(&self.signature).map_err(CryptoError::Signature)?;

        let message = signing_bytes(&self.call, &self.signer, &self.nonce)?;
        key.verify(&message, &signature)
            .map_err(CryptoError::Signature)?;

        Ok(())
    }
}

/// Canonical bytes covered by a call signature
pub fn signing_bytes(call: &LedgerCall, signer: &Address, nonce: &Uuid) -> Result<Vec<u8>, Error> {
    serde_cbor::to_vec(&(call, signer, nonce))
        .map_err(|e| LedgerError::Signing(format!("unable to encode call: {}", e)).into())
}
