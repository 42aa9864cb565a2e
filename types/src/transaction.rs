use core::fmt;

/// The width of a [`TxId`] in bytes.
pub const TX_ID_LEN: usize = 32;

/// A transaction identifier.
///
/// An opaque fixed-width hash, hex-encoded on the REST surface. Equality and
/// hashing are the only operations the core relies on.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub [u8; TX_ID_LEN]);

impl TxId {
    /// Parses a `TxId` from a 64 character hex string.
    pub fn from_hex(s: &str) -> Result<Self, InvalidTxIdError> {
        if s.len() != TX_ID_LEN * 2 {
            return Err(InvalidTxIdError);
        }

        let mut bytes = [0; TX_ID_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidTxIdError)?;

        Ok(Self(bytes))
    }

    pub const fn as_bytes(&self) -> &[u8; TX_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", hex::encode(self.0))
    }
}

impl From<[u8; TX_ID_LEN]> for TxId {
    fn from(bytes: [u8; TX_ID_LEN]) -> Self {
        Self(bytes)
    }
}

/// The supplied string was not a valid transaction hash.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transaction hash")]
pub struct InvalidTxIdError;
