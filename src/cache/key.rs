//! Cache key composition.

use std::fmt;

use sha2::{Digest, Sha256};

/// Identifies one cached response: who asked (partition), what they asked for
/// (requested URL, query included) and with which credential (raw
/// `Authorization` value, empty when absent).
///
/// The authorization value is part of the key even on public paths: two
/// callers in the same partition holding different credentials must never
/// read each other's entries.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheKey;
///
/// let a = CacheKey::build("users", "/api/posts/42", "JWT alice");
/// let b = CacheKey::build("users", "/api/posts/42", "JWT bob");
/// assert_ne!(a, b);
/// assert_eq!(a, CacheKey::build("users", "/api/posts/42", "JWT alice"));
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    partition: String,
    url: String,
    authorization: String,
}

impl CacheKey {
    pub fn build(
        partition: impl Into<String>,
        requested_url: impl Into<String>,
        authorization: impl Into<String>,
    ) -> Self {
        let partition = partition.into();
        let url = requested_url.into();
        let authorization = authorization.into();

        // Length prefixes keep ("a-b", "c") and ("a", "b-c") apart.
        let mut hasher = Sha256::new();
        for component in [&partition, &url, &authorization] {
            hasher.update((component.len() as u64).to_be_bytes());
            hasher.update(component.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());

        Self {
            digest,
            partition,
            url,
            authorization,
        }
    }

    /// Opaque lookup string (lowercase hex SHA-256).
    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn authorization(&self) -> &str {
        &self.authorization
    }
}

// Only the digest is displayed so credentials never reach the logs.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}
