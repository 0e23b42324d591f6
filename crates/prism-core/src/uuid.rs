//! Identifiers for Prism entities and tasks.
//!
//! The server assigns identifiers; this module wraps them in distinct types so a task
//! uuid cannot be passed where an entity uuid is expected. Format checking is governed
//! by [`UuidPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// How strictly identifiers are checked before they are used in a request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidPolicy {
    /// Any non-empty string without path separators
    #[default]
    NonEmpty,
    /// RFC 4122 textual form
    Rfc4122,
}

impl UuidPolicy {
    /// Check `input` against this policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUuid`] when the input is empty, contains `/`, or (for
    /// [`UuidPolicy::Rfc4122`]) does not parse as a uuid.
    pub fn check(self, input: &str) -> Result<()> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidUuid("identifier must not be empty".to_string()));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidUuid(input.to_string()));
        }
        if self == Self::Rfc4122 {
            validate_uuid(trimmed)?;
        }
        Ok(())
    }
}

/// Macro to generate string-backed identifier types.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier after checking it against `policy`.
            ///
            /// # Errors
            ///
            /// Returns an error if the identifier violates the policy.
            pub fn parse_with(input: &str, policy: UuidPolicy) -> Result<Self> {
                policy.check(input)?;
                Ok(Self(input.trim().to_string()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Converts into the inner string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_with(s, UuidPolicy::NonEmpty)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid.to_string())
            }
        }
    };
}

id_type!(EntityUuid, "Server-assigned entity identifier");
id_type!(TaskUuid, "Server-assigned task identifier");

/// Validates a uuid string in RFC 4122 textual form.
///
/// # Errors
///
/// Returns an error if the string is not a valid uuid.
pub fn validate_uuid(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_non_empty_policy_accepts_opaque_ids() {
        let id = EntityUuid::parse_with("IMG-1", UuidPolicy::NonEmpty).unwrap();
        assert_eq!(id.as_str(), "IMG-1");
        assert_eq!(id.to_string(), "IMG-1");
    }

    #[test]
    fn test_policy_rejects_empty_and_path_like() {
        assert!(matches!(
            EntityUuid::parse_with("", UuidPolicy::NonEmpty),
            Err(Error::InvalidUuid(_))
        ));
        assert!(matches!(
            EntityUuid::parse_with("   ", UuidPolicy::NonEmpty),
            Err(Error::InvalidUuid(_))
        ));
        assert!("../tasks".parse::<TaskUuid>().is_err());
    }

    #[test]
    fn test_rfc4122_policy() {
        assert!(EntityUuid::parse_with(VALID_UUID, UuidPolicy::Rfc4122).is_ok());
        assert!(matches!(
            EntityUuid::parse_with("IMG-1", UuidPolicy::Rfc4122),
            Err(Error::InvalidUuid(_))
        ));
        assert_eq!(
            validate_uuid(VALID_UUID).unwrap().to_string(),
            VALID_UUID
        );
    }

    #[test]
    fn test_trims_whitespace() {
        let id: TaskUuid = " T-1 ".parse().unwrap();
        assert_eq!(id.as_str(), "T-1");
    }

    #[test]
    fn test_serde_transparent() {
        let id: EntityUuid = "VM-9".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"VM-9\"");
        let back: EntityUuid = serde_json::from_str("\"VM-9\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::parse_str(VALID_UUID).unwrap();
        let id = EntityUuid::from(uuid);
        assert_eq!(id.as_ref(), VALID_UUID);
    }

    #[test]
    fn test_policy_default() {
        assert_eq!(UuidPolicy::default(), UuidPolicy::NonEmpty);
    }
}
