use crate::error::{FacegateError, Result};
use crate::types::{ImageKey, OwnerId};

/// Guard deciding whether an identity may operate on a storage key.
pub trait AccessGate: Send + Sync {
    /// Pure predicate over the raw identity and key. No I/O.
    fn authorize(&self, identity: &str, key: &str) -> bool;

    /// Guard form of [`authorize`](Self::authorize) for parsed inputs.
    fn require(&self, identity: &OwnerId, key: &ImageKey) -> Result<()> {
        if self.authorize(identity.as_str(), key.as_str()) {
            Ok(())
        } else {
            tracing::warn!(identity = %identity, key = %key, "access denied");
            Err(FacegateError::Authorization {
                identity: identity.to_string(),
                key: key.to_string(),
            })
        }
    }
}

/// Grants access iff the key's embedded owner segment equals the identity.
pub struct OwnerScopedGate;

impl AccessGate for OwnerScopedGate {
    fn authorize(&self, identity: &str, key: &str) -> bool {
        if identity.is_empty() {
            return false;
        }
        match ImageKey::parse(key) {
            Ok(parsed) => parsed.owner() == identity,
            Err(_) => false,
        }
    }
}
