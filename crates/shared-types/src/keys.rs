//! # Store Keys
//!
//! Opaque keys naming transactions and outputs across the Chain Store and
//! the mempool. Keys order by chain position; zero-conf keys sort after
//! every confirmed key.
//!
//! ```text
//! confirmed tx:  [height:24 | dup:8] BE   [tx index: u16 BE]
//! zero-conf tx:  0xFF 0xFF                [zc id: u32 BE]
//! output:        <tx key: 6 bytes>        [output index: u32 BE]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a zero-conf key.
pub const ZC_PREFIX: [u8; 2] = [0xFF, 0xFF];

/// Height used for anything that is not in a block.
pub const UNCONFIRMED_HEIGHT: u32 = u32::MAX;

/// Six-byte key of a confirmed or zero-conf transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxKey([u8; 6]);

impl TxKey {
    /// Key of a confirmed transaction.
    #[must_use]
    pub fn confirmed(height: u32, dup_id: u8, tx_index: u16) -> Self {
        let hgtx = ((height & 0x00FF_FFFF) << 8) | u32::from(dup_id);
        let mut bytes = [0u8; 6];
        bytes[..4].copy_from_slice(&hgtx.to_be_bytes());
        bytes[4..].copy_from_slice(&tx_index.to_be_bytes());
        Self(bytes)
    }

    /// Key of a zero-conf transaction.
    #[must_use]
    pub fn zero_conf(id: u32) -> Self {
        let mut bytes = [0u8; 6];
        bytes[..2].copy_from_slice(&ZC_PREFIX);
        bytes[2..].copy_from_slice(&id.to_be_bytes());
        Self(bytes)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    #[must_use]
    pub fn is_zero_conf(&self) -> bool {
        self.0[..2] == ZC_PREFIX
    }

    /// Block height, or `UNCONFIRMED_HEIGHT` for zero-conf keys.
    #[must_use]
    pub fn height(&self) -> u32 {
        if self.is_zero_conf() {
            return UNCONFIRMED_HEIGHT;
        }
        u32::from_be_bytes([0, self.0[0], self.0[1], self.0[2]])
    }

    #[must_use]
    pub fn dup_id(&self) -> u8 {
        self.0[3]
    }

    /// Index within the block; zero for zero-conf keys.
    #[must_use]
    pub fn tx_index(&self) -> u16 {
        if self.is_zero_conf() {
            return 0;
        }
        u16::from_be_bytes([self.0[4], self.0[5]])
    }

    /// The monotonic id of a zero-conf key.
    #[must_use]
    pub fn zc_id(&self) -> Option<u32> {
        self.is_zero_conf()
            .then(|| u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]]))
    }

    /// Key of output `index` of this transaction.
    #[must_use]
    pub fn output(&self, index: u32) -> OutputKey {
        OutputKey::new(*self, index)
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.zc_id() {
            Some(id) => write!(f, "zc#{id}"),
            None => write!(f, "{}/{}/{}", self.height(), self.dup_id(), self.tx_index()),
        }
    }
}

impl fmt::Debug for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxKey({self})")
    }
}

/// Ten-byte key of one transaction output. The index is kept at full
/// outpoint width so every output the parser accepts has a distinct key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputKey {
    tx: TxKey,
    index: u32,
}

impl OutputKey {
    #[must_use]
    pub fn new(tx: TxKey, index: u32) -> Self {
        Self { tx, index }
    }

    #[must_use]
    pub fn tx_key(&self) -> TxKey {
        self.tx
    }

    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[must_use]
    pub fn is_zero_conf(&self) -> bool {
        self.tx.is_zero_conf()
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..6].copy_from_slice(self.tx.as_bytes());
        out[6..].copy_from_slice(&self.index.to_be_bytes());
        out
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx, self.index)
    }
}

impl fmt::Debug for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputKey({self})")
    }
}
