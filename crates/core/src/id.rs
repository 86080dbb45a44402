//! Opaque, prefixed entity identifiers.
//!
//! Every entity ID is a thin wrapper around a `smol_str::SmolStr` carrying a
//! fixed human-readable prefix (`org_`, `usr_`, ...) followed by a
//! [`nanoid`] suffix. The prefix makes IDs self-describing in logs and audit
//! records without a lookup; the newtype keeps an `OrganizationId` from ever
//! being passed where a `SessionId` is expected.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

const ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const SUFFIX_LEN: usize = 20;

/// Generates a prefixed ID newtype with `new`, `parse`, `Display`, and serde
/// support. The wire representation is always the bare string
/// (`"org_3f9a..."`), never a struct.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(SmolStr);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mints a fresh, random ID.
            pub fn new() -> Self {
                let suffix = nanoid::nanoid!(SUFFIX_LEN, &ALPHABET);
                Self(SmolStr::new(format!("{}{}", $prefix, suffix)))
            }

            /// Parses an existing ID string, rejecting the wrong prefix.
            pub fn parse(raw: &str) -> Result<Self, $crate::id::IdParseError> {
                if !raw.starts_with($prefix) {
                    return Err($crate::id::IdParseError {
                        expected_prefix: $prefix,
                        got: raw.to_string(),
                    });
                }
                Ok(Self(SmolStr::new(raw)))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        crate::macros::simple_display!($name, |id| id.0.as_str());

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::id::IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

pub(crate) use define_id;

#[derive(Debug, thiserror::Error)]
#[error("invalid id: expected prefix {expected_prefix:?}, got {got:?}")]
pub struct IdParseError {
    pub expected_prefix: &'static str,
    pub got: String,
}

define_id!(
    /// Identifies an [`crate::org::Organization`].
    OrganizationId, "org_"
);
define_id!(
    /// Identifies a [`crate::user::User`].
    UserId, "usr_"
);
define_id!(
    /// Identifies an [`crate::agent::Agent`].
    AgentId, "agt_"
);
define_id!(
    /// Identifies a [`crate::session::Session`].
    SessionId, "sess_"
);
define_id!(
    /// Identifies a [`crate::template::Template`].
    TemplateId, "tpl_"
);
define_id!(
    /// Identifies a [`crate::quota::Quota`].
    QuotaId, "qta_"
);
define_id!(
    /// Identifies an [`crate::audit::AuditRecord`].
    AuditRecordId, "aud_"
);
define_id!(
    /// Identifies a [`crate::vnc::VncStream`].
    VncStreamId, "vstr_"
);
define_id!(
    /// Correlates an in-flight control-channel request with its response.
    CorrelationId, "corr_"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = OrganizationId::new();
        let parsed = OrganizationId::parse(id.as_str()).expect("valid id");
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let session_id = SessionId::new();
        let err = OrganizationId::parse(session_id.as_str()).unwrap_err();
        assert_eq!(err.expected_prefix, "org_");
    }

    #[test]
    fn ids_of_different_types_are_not_interchangeable() {
        // This is enforced at compile time; this test documents the
        // property rather than exercising it.
        let org = OrganizationId::new();
        let user = UserId::new();
        assert_ne!(org.as_str(), user.as_str());
    }
}
