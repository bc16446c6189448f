//! Typed identifier newtypes, one per entity, all backed by the same
//! sortable [`wlc_idgen::Id`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wlc_idgen::{generate, now_ms, Id, IdParseError};

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Id);

        impl $name {
            pub fn new() -> Self {
                Self(generate(now_ms()))
            }

            pub fn at(now_ms: u64) -> Self {
                Self(generate(now_ms))
            }

            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                Id::parse(s).map(Self)
            }

            pub fn inner(&self) -> Id {
                self.0
            }

            pub fn from_inner(id: Id) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(AccountId);
typed_id!(TransactionId);
typed_id!(LedgerEntryId);
typed_id!(ApprovalWorkflowId);
typed_id!(AuditEntryId);

/// Caller-supplied opaque token guaranteeing at-most-once effect for one
/// logical operation. Unlike the ids above this is never minted by us —
/// it is validated and stored verbatim.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyKeyError {
    #[error("idempotency key must be 16-255 characters, got {0}")]
    WrongLength(usize),
    #[error("idempotency key contains a character outside [A-Za-z0-9_-]")]
    InvalidChar,
}

impl IdempotencyKey {
    pub fn parse(s: impl Into<String>) -> Result<Self, IdempotencyKeyError> {
        let s = s.into();
        if s.len() < 16 || s.len() > 255 {
            return Err(IdempotencyKeyError::WrongLength(s.len()));
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(IdempotencyKeyError::InvalidChar);
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdempotencyKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_ids_are_distinct_types_over_the_same_id_space() {
        let a = AccountId::new();
        let b = TransactionId::parse(&a.to_string()).unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn idempotency_key_rejects_short_and_malformed() {
        assert!(IdempotencyKey::parse("tooshort").is_err());
        assert!(IdempotencyKey::parse("a".repeat(300)).is_err());
        assert!(IdempotencyKey::parse("has a space in it!!").is_err());
        assert!(IdempotencyKey::parse("dep-2026-07-28-userA-01").is_ok());
    }
}
