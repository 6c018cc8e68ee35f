use crate::errors::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters of the sha-256 digest kept in a revision id.
const DIGEST_LEN: usize = 32;

/// Revision identifier in `generation-digest` form, e.g. `2-9f86d081884c7d65`.
///
/// The generation counts edits along one branch of the revision tree; the
/// digest is derived from the parent revision id, the tombstone flag and the
/// revision's properties, so concurrent edits from the same parent get
/// distinct ids. Ordering is by generation first, then digest lexically,
/// which is what makes winner selection deterministic across processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevId {
    generation: u64,
    digest: String,
}

impl RevId {
    /// Derive the id of a new revision from its parent and content.
    pub fn derive(parent: Option<&RevId>, properties: &Value, deleted: bool) -> RevId {
        Self::derive_tagged(parent, properties, deleted, &[])
    }

    /// Like [`RevId::derive`], with extra bytes folded into the digest.
    ///
    /// Attachment writes use this: the properties are unchanged, so the
    /// attachment name and blob digest must feed the hash or two concurrent
    /// attaches from the same parent would collide on one id.
    pub fn derive_tagged(
        parent: Option<&RevId>,
        properties: &Value,
        deleted: bool,
        tag: &[u8],
    ) -> RevId {
        let generation = parent.map(|p| p.generation + 1).unwrap_or(1);
        let canonical = serde_json::to_string(properties).unwrap_or_default();

        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([deleted as u8]);
        hasher.update(canonical.as_bytes());
        hasher.update(tag);

        let digest = hex::encode(hasher.finalize());
        RevId {
            generation,
            digest: digest[..DIGEST_LEN].to_string(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for RevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidRevId(s.to_string()))?;

        let generation: u64 = generation
            .parse()
            .map_err(|_| StoreError::InvalidRevId(s.to_string()))?;

        if generation == 0
            || digest.is_empty()
            || !digest.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(StoreError::InvalidRevId(s.to_string()));
        }

        Ok(RevId {
            generation,
            digest: digest.to_ascii_lowercase(),
        })
    }
}

impl Serialize for RevId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RevId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
