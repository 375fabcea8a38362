//! Strongly-typed identifiers for domain entities
//!
//! Using newtype wrappers around UUIDs provides type safety and prevents
//! accidental mixing of different identifier types (a split's user id can
//! never be passed where a bill id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Trip and membership identifiers
define_id!(TripId, "TRP");
define_id!(UserId, "USR");

// Bill identifiers
define_id!(BillId, "BIL");
define_id!(BillItemId, "ITM");
define_id!(ParticipantId, "PRT");
define_id!(SplitId, "SPL");
define_id!(ReceiptId, "RCP");

/// Client-supplied temporary identifier of a bill item
///
/// Items that have not been confirmed yet have no server id, so the editor
/// and the confirm payload correlate splits to items through this opaque
/// string. It is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempItemId(String);

impl TempItemId {
    /// Wraps a client-supplied identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh identifier for items created server-side
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TempItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TempItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<BillItemId> for TempItemId {
    fn from(id: BillItemId) -> Self {
        Self(id.as_uuid().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_id_display() {
        let id = BillId::new();
        let display = id.to_string();
        assert!(display.starts_with("BIL-"));
    }

    #[test]
    fn test_id_parsing() {
        let original = TripId::new();
        let parsed: TripId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);

        let bare: TripId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, bare);
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let user_id = UserId::from(uuid);
        let back: Uuid = user_id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_temp_item_id_from_server_id() {
        let server = BillItemId::new();
        let temp = TempItemId::from(server);
        assert_eq!(temp.as_str(), server.as_uuid().to_string());
        assert!(!temp.is_blank());
        assert!(TempItemId::new("  ").is_blank());
    }
}
