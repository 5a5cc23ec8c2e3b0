//! VehicleId - Cheap-to-clone vehicle identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Vehicle identifier with cheap cloning.
///
/// Every telemetry tick and every estimate carries the vehicle id, and the
/// fleet registry keys its processing units by it, so ids are cloned on
/// every tick. `Arc<str>` keeps that a reference-count bump.
///
/// # Examples
/// ```
/// use contracts::VehicleId;
///
/// let id: VehicleId = "truck-017".into();
/// let id2 = id.clone();
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "truck-017");
/// ```
#[derive(Clone, Default)]
pub struct VehicleId(Arc<str>);

impl VehicleId {
    /// Create a new VehicleId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for VehicleId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for VehicleId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for VehicleId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VehicleId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for VehicleId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VehicleId({:?})", self.0)
    }
}

impl PartialEq for VehicleId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for VehicleId {}

impl PartialEq<str> for VehicleId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for VehicleId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for VehicleId {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

// Must hash like `str` so `HashMap<VehicleId, _>` can be queried with `&str`.
impl Hash for VehicleId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for VehicleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VehicleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_shares_storage() {
        let id1: VehicleId = "truck-1".into();
        let id2 = id1.clone();
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_equality() {
        let id: VehicleId = "truck-1".into();
        assert_eq!(id, "truck-1");
        assert_eq!(id, String::from("truck-1"));
        assert_eq!(id, VehicleId::from("truck-1"));
    }

    #[test]
    fn test_hashmap_lookup_by_str() {
        let mut map: HashMap<VehicleId, u32> = HashMap::new();
        map.insert("a".into(), 1);
        map.insert("b".into(), 2);
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn test_serde() {
        let id: VehicleId = "truck-9".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"truck-9\"");
        let parsed: VehicleId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
