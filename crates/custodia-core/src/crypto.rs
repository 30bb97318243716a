//! Hashing primitives for Custodia.
//!
//! Wraps Blake3 with strong 32-byte digest types. Entry digests and
//! document digests are distinct types so one can never stand in for the
//! other.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

macro_rules! digest_type {
    ($(#[$meta:meta])* $name:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
                let arr: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| CoreError::InvalidDigest(format!("expected 32 bytes, got {}", bytes.len())))?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice
                    .try_into()
                    .map_err(|_| CoreError::InvalidDigest(format!("expected 32 bytes, got {}", slice.len())))?;
                Ok(Self(arr))
            }
        }
    };
}

digest_type!(
    /// A 32-byte Blake3 hash.
    Blake3Hash,
    "Blake3"
);

digest_type!(
    /// The chain digest of an audit entry.
    ///
    /// Computed from the previous entry's digest and the entry's own
    /// content. Never chosen by a caller.
    EntryDigest,
    "EntryDigest"
);

digest_type!(
    /// Digest of a document submitted for signature.
    DocumentDigest,
    "DocumentDigest"
);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash `data` under a domain-separation prefix.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    /// The zero hash (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl EntryDigest {
    /// The `previousEntryDigest` of the first entry in every chain.
    pub const GENESIS: Self = Self([0u8; 32]);

    /// Whether this is the genesis constant.
    pub fn is_genesis(&self) -> bool {
        *self == Self::GENESIS
    }
}

impl DocumentDigest {
    /// Domain prefix for document digests.
    pub const DOMAIN: &'static [u8] = b"custodia-document-v0:";

    /// Digest the exact bytes of a document.
    pub fn of_document(bytes: &[u8]) -> Self {
        Self(Blake3Hash::hash_with_domain(Self::DOMAIN, bytes).0)
    }
}
