//! Node and edge addresses
//!
//! An address is an ordered sequence of string parts. Each source owns the
//! addresses under its own prefix (e.g. `["sourcecred", "github", ...]`), which
//! is what makes per-source graphs disjoint by construction.
//!
//! Addresses serialize as a single string: a one-letter kind tag followed by
//! every part, each terminated by a NUL byte (`"N\0sourcecred\0github\0"`).
//! Parts therefore must not contain NUL.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const SEPARATOR: char = '\0';

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(Vec<String>);

        impl $name {
            /// The empty address, which is a prefix of every address
            pub fn empty() -> Self {
                Self(Vec::new())
            }

            /// Build an address from trusted parts (constants, declarations)
            pub fn from_parts<I, S>(parts: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
                debug_assert!(
                    parts.iter().all(|p| !p.contains(SEPARATOR)),
                    "address part contains NUL"
                );
                Self(parts)
            }

            /// Build an address from untrusted parts (user names, URLs)
            pub fn try_from_parts<I, S>(parts: I) -> Result<Self>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
                if let Some(bad) = parts.iter().find(|p| p.contains(SEPARATOR)) {
                    return Err(Error::InvalidInput(format!(
                        "address part contains NUL: {:?}",
                        bad
                    )));
                }
                Ok(Self(parts))
            }

            /// Extend this address with more parts
            pub fn append<I, S>(&self, parts: I) -> Result<Self>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                let extra = Self::try_from_parts(parts)?;
                let mut all = self.0.clone();
                all.extend(extra.0);
                Ok(Self(all))
            }

            pub fn parts(&self) -> &[String] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// True when `prefix` is a part-wise prefix of this address
            pub fn has_prefix(&self, prefix: &Self) -> bool {
                self.0.starts_with(&prefix.0)
            }

            fn encode(&self) -> String {
                let mut out = String::from($tag);
                out.push(SEPARATOR);
                for part in &self.0 {
                    out.push_str(part);
                    out.push(SEPARATOR);
                }
                out
            }

            fn decode(raw: &str) -> Result<Self> {
                let body = raw
                    .strip_prefix(concat!($tag, "\0"))
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "expected {} address, got {:?}",
                            $tag, raw
                        ))
                    })?;
                if body.is_empty() {
                    return Ok(Self::empty());
                }
                let body = body.strip_suffix(SEPARATOR).ok_or_else(|| {
                    Error::InvalidInput(format!("unterminated address: {:?}", raw))
                })?;
                Ok(Self(body.split(SEPARATOR).map(str::to_string).collect()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{:?}", $tag, self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<Ser: Serializer>(
                &self,
                serializer: Ser,
            ) -> std::result::Result<Ser::Ok, Ser::Error> {
                serializer.serialize_str(&self.encode())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::decode(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

address_type!(
    /// Address of a graph node
    NodeAddress,
    "N"
);

address_type!(
    /// Address of a graph edge
    EdgeAddress,
    "E"
);
