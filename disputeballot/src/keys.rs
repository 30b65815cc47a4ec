use crate::*;
use chrono::{DateTime, Utc};
use rand_core::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// RSA modulus size for ballot encryption keys
pub const KEY_BITS: usize = 2048;

/// Public half of the ballot encryption key (RSA-OAEP, SHA-256).
///
/// Serialized as base64 DER SubjectPublicKeyInfo.
#[derive(Clone, Debug, PartialEq)]
pub struct VotingPublicKey(RsaPublicKey);

impl VotingPublicKey {
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        if s.trim().is_empty() {
            return Err(CryptoError::KeyImport("public key is empty".to_owned()));
        }
        let der = decode_base64(s).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
        let key =
            RsaPublicKey::from_public_key_der(&der).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
        Ok(VotingPublicKey(key))
    }

    pub fn to_base64(&self) -> Result<String, CryptoError> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyExport(e.to_string()))?;
        Ok(encode_base64(der.as_bytes()))
    }

    /// Encrypt with OAEP padding. Two encryptions of the same plaintext differ.
    pub fn encrypt<R: CryptoRng + RngCore>(
        &self,
        rng: &mut R,
        plaintext: &[u8],
    ) -> Result<Ciphertext, CryptoError> {
        let bytes = self.0.encrypt(rng, Oaep::new::<Sha256>(), plaintext)?;
        Ok(Ciphertext(bytes))
    }
}

/// Private half of the ballot encryption key.
///
/// Never serialized except into the maintainer's key file, and never logged.
#[derive(Clone)]
pub struct VotingPrivateKey(RsaPrivateKey);

impl VotingPrivateKey {
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        if s.trim().is_empty() {
            return Err(CryptoError::KeyImport("private key is empty".to_owned()));
        }
        let der = decode_base64(s).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
        let key =
            RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
        Ok(VotingPrivateKey(key))
    }

    pub fn to_base64(&self) -> Result<String, CryptoError> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyExport(e.to_string()))?;
        Ok(encode_base64(der.as_bytes()))
    }

    pub fn public_key(&self) -> VotingPublicKey {
        VotingPublicKey(RsaPublicKey::from(&self.0))
    }

    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.0.is_empty() {
            return Err(CryptoError::MalformedCiphertext("empty ciphertext".to_owned()));
        }
        Ok(self.0.decrypt(Oaep::new::<Sha256>(), &ciphertext.0)?)
    }
}

impl std::fmt::Debug for VotingPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("VotingPrivateKey(..)")
    }
}

/// The maintainer's ballot encryption keypair for one project (and optionally one dispute)
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public_key: VotingPublicKey,
    pub private_key: VotingPrivateKey,
    pub project_id: u32,
    pub dispute_id: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Generate a fresh keypair from the operating system RNG
    pub fn generate(project_id: u32, dispute_id: Option<u32>) -> Result<Self, Error> {
        let mut rng = rand::rngs::OsRng;
        KeyPair::generate_with_rng(&mut rng, project_id, dispute_id)
    }

    pub fn generate_with_rng<R: CryptoRng + RngCore>(
        rng: &mut R,
        project_id: u32,
        dispute_id: Option<u32>,
    ) -> Result<Self, Error> {
        let private = RsaPrivateKey::new(rng, KEY_BITS).map_err(CryptoError::KeyGeneration)?;
        let private_key = VotingPrivateKey(private);

        info!(
            "generated {}-bit voting key for project {}{}",
            KEY_BITS,
            project_id,
            dispute_id.map(|id| format!(", dispute {}", id)).unwrap_or_default()
        );

        Ok(KeyPair {
            public_key: private_key.public_key(),
            private_key,
            project_id,
            dispute_id,
            created_at: Utc::now(),
        })
    }

    /// Export into the transportable key file record
    pub fn to_key_file(&self) -> Result<KeyFile, Error> {
        let description = match self.dispute_id {
            Some(id) => format!("Dispute #{} anonymous voting keys", id),
            None => format!("Project #{} anonymous voting keys", self.project_id),
        };

        Ok(KeyFile {
            public_key: self.public_key.to_base64()?,
            private_key: self.private_key.to_base64()?,
            project_id: self.project_id,
            dispute_id: self.dispute_id,
            created_at: self.created_at,
            description,
        })
    }

    /// Load a keypair from the bytes of a key file.
    ///
    /// Fails with `CryptoError::InvalidKeyFile` when either key half or the project id
    /// is missing, or when the halves do not belong together.
    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let raw: RawKeyFile = serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKeyFile(format!("not a key file: {}", e)))?;

        let public_key = required(raw.public_key, "publicKey")?;
        let private_key = required(raw.private_key, "privateKey")?;
        let project_id = raw
            .project_id
            .ok_or_else(|| CryptoError::InvalidKeyFile("missing projectId".to_owned()))?;
        let created_at = raw
            .created_at
            .ok_or_else(|| CryptoError::InvalidKeyFile("missing createdAt".to_owned()))?;

        let public_key = VotingPublicKey::from_base64(&public_key)?;
        let private_key = VotingPrivateKey::from_base64(&private_key)?;
        if private_key.public_key() != public_key {
            return Err(CryptoError::InvalidKeyFile(
                "publicKey does not belong to privateKey".to_owned(),
            )
            .into());
        }

        Ok(KeyPair {
            public_key,
            private_key,
            project_id,
            dispute_id: raw.dispute_id,
            created_at,
        })
    }

    /// Read and load a key file from disk
    pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let keypair = KeyPair::load(&bytes)?;
        debug!(
            "loaded voting key for project {} from {}",
            keypair.project_id,
            path.as_ref().display()
        );
        Ok(keypair)
    }

    /// Publish the public half as the project's anonymous voting config.
    ///
    /// Only the maintainer may do this. Publishing a new key for a project with
    /// ballots in flight makes those ballots untallyable.
    pub async fn publish<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        signer: &dyn TransactionSigner,
        maintainer: &Address,
        policy: &ConfirmationPolicy,
    ) -> Result<TxHash, Error> {
        if signer.address() != maintainer {
            return Err(AuthorizationError::NotMaintainer(signer.address().clone()).into());
        }

        let call = LedgerCall::AnonymousVotingSetup {
            maintainer: maintainer.clone(),
            project_id: self.project_id,
            public_key: self.public_key.to_base64()?,
        };
        let hash = submit_and_confirm(ledger, signer, call, policy).await?;
        info!(
            "published voting key for project {} in {}",
            self.project_id, hash
        );
        Ok(hash)
    }
}

fn required(field: Option<String>, name: &str) -> Result<String, CryptoError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CryptoError::InvalidKeyFile(format!("missing {}", name))),
    }
}

/// On-disk keypair record, produced once per setup
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    pub public_key: String,
    pub private_key: String,
    pub project_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispute_id: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

impl KeyFile {
    pub fn file_name(&self) -> String {
        match self.dispute_id {
            Some(id) => format!("dispute-{}-keys.json", id),
            None => format!("project-{}-keys.json", self.project_id),
        }
    }

    /// Write the key file into `dir`, refusing to replace an existing file.
    ///
    /// Returns the path written. The file is owner-readable only on unix.
    pub async fn persist(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = dir.as_ref().join(self.file_name());
        let json = serde_json::to_vec_pretty(self)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await?;
        file.write_all(&json).await?;
        file.flush().await?;

        info!("wrote voting keys to {}", path.display());
        Ok(path)
    }
}

// Everything optional so a missing field is reported as InvalidKeyFile, not a JSON error
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeyFile {
    public_key: Option<String>,
    private_key: Option<String>,
    project_id: Option<u32>,
    dispute_id: Option<u32>,
    created_at: Option<DateTime<Utc>>,
}
