use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of digits that follow the single-letter prefix of every identifier.
pub const ID_DIGITS: usize = 9;

/// Errors raised when an identifier does not match its fixed pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind} ID is required")]
    Empty { kind: &'static str },
    #[error("{kind} ID must be '{prefix}' followed by 9 digits (got '{value}')")]
    Malformed {
        kind: &'static str,
        prefix: char,
        value: String,
    },
}

fn normalize(kind: &'static str, prefix: char, raw: &str) -> Result<String, IdError> {
    let value = raw.trim().to_ascii_uppercase();
    if value.is_empty() {
        return Err(IdError::Empty { kind });
    }

    let mut chars = value.chars();
    let prefix_ok = chars.next() == Some(prefix);
    let digits = chars.as_str();
    if !prefix_ok || digits.len() != ID_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::Malformed {
            kind,
            prefix,
            value: raw.trim().to_string(),
        });
    }

    Ok(value)
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Single-letter prefix every identifier of this kind starts with.
            pub const PREFIX: char = $prefix;

            /// Validates the raw input and upper-cases it.
            pub fn parse(raw: &str) -> Result<Self, IdError> {
                normalize($kind, $prefix, raw).map(Self)
            }

            /// Wraps a value read back from storage, where CHECK constraints
            /// already enforce the pattern.
            pub fn from_trusted(value: String) -> Self {
                Self(value)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_id!(
    /// Customer identifier: `C` followed by nine digits.
    CustomerId,
    'C',
    "Customer"
);

define_id!(
    /// Product identifier: `P` followed by nine digits.
    ProductId,
    'P',
    "Product"
);

define_id!(
    /// Order identifier: `O` followed by nine digits.
    OrderId,
    'O',
    "Order"
);
