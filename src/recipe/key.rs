//! Cache key derivation
//!
//! A cache key is a sha256 digest over the recipe's canonical serialization,
//! rendered as "sha256:<hex>". Nothing non-reproducible (timestamps, file
//! ordering, environment) ever enters the hash input.

use super::Recipe;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const ALGORITHM: &str = "sha256";

/// Deterministic fingerprint of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CacheKey {
    hex: String,
}

impl CacheKey {
    /// Derive the key for a recipe. Pure: equal canonical serializations
    /// always produce equal keys.
    pub fn derive(recipe: &Recipe) -> Self {
        let digest = Sha256::digest(recipe.canonical_bytes());
        Self {
            hex: hex::encode(digest),
        }
    }

    pub fn algorithm(&self) -> &str {
        ALGORITHM
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", ALGORITHM, self.hex)
    }
}

impl FromStr for CacheKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hash) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid cache key (expected 'algorithm:hash'): {s}"))?;
        if algorithm != ALGORITHM {
            return Err(format!("Unsupported digest algorithm: {algorithm}"));
        }
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("Invalid {ALGORITHM} digest: {hash}"));
        }
        Ok(Self {
            hex: hash.to_ascii_lowercase(),
        })
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
