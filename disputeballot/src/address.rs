use crate::*;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryInto;
use std::str::FromStr;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const ADDRESS_LEN: usize = 56;
const PAYLOAD_LEN: usize = 35;

/// Kind of ledger address, encoded in the strkey version byte
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AddressKind {
    /// `G...` account address, wrapping an ed25519 public key
    Account = 6 << 3,
    /// `C...` contract address
    Contract = 2 << 3,
}

/// A ledger address in strkey form.
///
/// A strkey is the RFC 4648 base32 encoding of a version byte, a 32 byte key and a
/// little-endian CRC16-XModem checksum of the preceding 33 bytes. Every `Address`
/// value has passed that check.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Account address for an ed25519 public key
    pub fn from_ed25519(public_key: &[u8; 32]) -> Self {
        Address::encode(AddressKind::Account, public_key)
    }

    /// Contract address for a 32 byte contract hash
    pub fn contract(hash: &[u8; 32]) -> Self {
        Address::encode(AddressKind::Contract, hash)
    }

    fn encode(kind: AddressKind, key: &[u8; 32]) -> Self {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(kind as u8);
        payload.extend_from_slice(key);
        let checksum = crc16_xmodem(&payload);
        payload.extend_from_slice(&checksum.to_le_bytes());

        Address(base32_encode(&payload))
    }

    pub fn kind(&self) -> AddressKind {
        match self.0.as_bytes()[0] {
            b'C' => AddressKind::Contract,
            _ => AddressKind::Account,
        }
    }

    /// The ed25519 public key behind an account address
    pub fn ed25519_key(&self) -> Option<[u8; 32]> {
        if self.kind() != AddressKind::Account {
            return None;
        }
        let payload = base32_decode(&self.0)?;
        payload[1..33].try_into().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ValidationError::InvalidAddress(s.to_owned(), reason);

        if s.is_empty() {
            return Err(ValidationError::EmptyField("address"));
        }
        if s.len() != ADDRESS_LEN {
            return Err(invalid("wrong length"));
        }
        let payload = base32_decode(s).ok_or_else(|| invalid("not base32"))?;

        let kind = payload[0];
        if kind != AddressKind::Account as u8 && kind != AddressKind::Contract as u8 {
            return Err(invalid("unknown version byte"));
        }

        let expected = crc16_xmodem(&payload[..33]);
        let found = u16::from_le_bytes([payload[33], payload[34]]);
        if expected != found {
            return Err(invalid("bad checksum"));
        }

        Ok(Address(s.to_owned()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

// Only ever called with 35 bytes, which is exactly 56 symbols with no padding
fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(ADDRESS_LEN);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for byte in bytes {
        buffer = (buffer << 8) | *byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(s: &str) -> Option<[u8; PAYLOAD_LEN]> {
    let mut out = Vec::with_capacity(PAYLOAD_LEN);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in s.bytes() {
        let value = BASE32_ALPHABET.iter().position(|a| *a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    out.try_into().ok()
}
