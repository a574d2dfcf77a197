//! Stable spawnable identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A stable identifier for a pooled spawnable instance.
///
/// Instances are recycled between the active and spare sets without ever
/// being destroyed, so the id keeps referring to the same slot across
/// rebinds. Cross-instance references (spawner attribution, kill tracking)
/// hold a `SpawnId` and resolve it through the pool on demand.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnId(pub u64);

impl SpawnId {
    /// Create a new unique SpawnId
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a SpawnId from a raw value (for deserialization/testing)
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SpawnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpawnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpawnId({})", self.0)
    }
}

impl fmt::Display for SpawnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let id1 = SpawnId::new();
        let id2 = SpawnId::new();
        assert_ne!(id1, id2);
        assert!(id2.0 > id1.0);
    }

    #[test]
    fn test_from_raw() {
        let id = SpawnId::from_raw(42);
        assert_eq!(id.raw(), 42);
    }
}
