//! Hash-lock primitives: the secret preimage and its published hash.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Serde helper to serialize/deserialize a 32-byte array as a hex string.
mod hex_array {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// The secret that unlocks a hash-locked contract.
///
/// Revealing the preimage on any head authorizes claims of every lock
/// sharing its hash.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preimage(#[serde(with = "hex_array")] pub [u8; 32]);

impl Preimage {
    /// Generate a fresh random preimage.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The BLAKE3 hash published in the lock.
    pub fn hash(&self) -> HashLock {
        HashLock::from(self)
    }
}

impl fmt::Display for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preimage({})", hex::encode(self.0))
    }
}

impl FromStr for Preimage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_hex32(s)?))
    }
}

/// BLAKE3 hash of a preimage, published in every lock of one payment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashLock(#[serde(with = "hex_array")] pub [u8; 32]);

impl From<&Preimage> for HashLock {
    fn from(preimage: &Preimage) -> Self {
        Self(*blake3::hash(&preimage.0).as_bytes())
    }
}

impl HashLock {
    /// Whether `preimage` hashes to this lock.
    pub fn matches(&self, preimage: &Preimage) -> bool {
        HashLock::from(preimage) == *self
    }
}

impl fmt::Display for HashLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for HashLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashLock({})", hex::encode(self.0))
    }
}

impl FromStr for HashLock {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_hex32(s)?))
    }
}

fn parse_hex32(s: &str) -> Result<[u8; 32], CoreError> {
    let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidHex(format!("expected 32 bytes, got {}", s.len() / 2)))
}
