use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IoError;

/// Opaque 16-byte token naming a logical channel.
///
/// Identifiers are only meaningful while the region that registered them is
/// alive; they are not stable across restarts. The textual form is the
/// hyphenated UUID spelling.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId([u8; StreamId::LEN]);

impl StreamId {
    /// Encoded size in bytes.
    pub const LEN: usize = 16;

    /// The all-zero identifier.
    pub const fn nil() -> Self {
        Self([0; Self::LEN])
    }

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Read an identifier from the first [`Self::LEN`] bytes of `bytes`.
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        let prefix: [u8; Self::LEN] = bytes.get(..Self::LEN)?.try_into().ok()?;
        Some(Self(prefix))
    }

    /// A fresh random identifier.
    pub fn random() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Uuid::from_bytes(self.0).hyphenated(), f)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({self})")
    }
}

impl FromStr for StreamId {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(|uuid| Self(*uuid.as_bytes()))
            .map_err(|err| IoError::InvalidStreamId {
                input: s.to_string(),
                reason: err.to_string(),
            })
    }
}

impl TryFrom<String> for StreamId {
    type Error = IoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamId> for String {
    fn from(value: StreamId) -> Self {
        value.to_string()
    }
}

impl From<Uuid> for StreamId {
    fn from(value: Uuid) -> Self {
        Self(*value.as_bytes())
    }
}
