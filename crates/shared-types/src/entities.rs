//! # Core Domain Entities
//!
//! Chain-level value types shared by every crate in the workspace.
//!
//! ## Clusters
//!
//! - **Chain**: `Hash`, `BlockHeader`, `OutPoint`
//! - **Addresses**: `ScrAddr` (script-type prefix + script hash)
//! - **Outputs**: `Utxo`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use std::fmt;

// =============================================================================
// BLOCKS
// =============================================================================

/// A 32-byte double SHA-256 hash (tx hash or block hash).
pub type Hash = [u8; 32];

/// The all-zero hash, used as the parent of the first block.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Double SHA-256 of `data`.
#[must_use]
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Hex rendering of a hash in display (reversed) byte order.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// The header of a block as stored by the Chain Store.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Distance from block 0.
    pub height: u32,
    /// Duplicate id, distinguishes competing blocks at the same height.
    pub dup_id: u8,
    /// Block id as assigned by the Chain Store.
    #[serde_as(as = "Bytes")]
    pub hash: Hash,
    /// All zeroes for block 0.
    #[serde_as(as = "Bytes")]
    pub prev_hash: Hash,
    /// Unix timestamp of the block.
    pub timestamp: u32,
    /// Transactions in the block, coinbase included.
    pub tx_count: u32,
}

impl BlockHeader {
    /// Serialized form returned to clients by header queries.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(77);
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.dup_id);
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.tx_count.to_le_bytes());
        out
    }
}

/// A reference to one output of one transaction.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the funding transaction.
    #[serde_as(as = "Bytes")]
    pub hash: Hash,
    /// Output index within the funding transaction.
    pub index: u32,
}

impl OutPoint {
    #[must_use]
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hash_to_hex(&self.hash), self.index)
    }
}

// =============================================================================
// SCRIPT ADDRESSES
// =============================================================================

/// Script-type prefixes of a `ScrAddr`.
pub mod scr_prefix {
    pub const P2PKH: u8 = 0x00;
    pub const P2SH: u8 = 0x05;
    pub const P2WPKH: u8 = 0x90;
    pub const NON_STANDARD: u8 = 0xFE;
}

/// Length of a `ScrAddr`: one prefix byte and a 20-byte script hash.
pub const SCR_ADDR_LEN: usize = 21;

/// A script address: script-type prefix followed by a 20-byte hash.
///
/// Every output script maps to exactly one `ScrAddr`; this is the unit
/// wallets register and the key of every per-address index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScrAddr(#[serde(with = "scr_addr_bytes")] [u8; SCR_ADDR_LEN]);

impl ScrAddr {
    /// Build a `ScrAddr` from a prefix and a 20-byte hash.
    #[must_use]
    pub fn new(prefix: u8, hash: [u8; 20]) -> Self {
        let mut bytes = [0u8; SCR_ADDR_LEN];
        bytes[0] = prefix;
        bytes[1..].copy_from_slice(&hash);
        Self(bytes)
    }

    /// Derive the `ScrAddr` of an output script.
    #[must_use]
    pub fn from_script(script: &[u8]) -> Self {
        let mut hash = [0u8; 20];
        match script {
            // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
            [0x76, 0xa9, 0x14, body @ .., 0x88, 0xac] if body.len() == 20 => {
                hash.copy_from_slice(body);
                Self::new(scr_prefix::P2PKH, hash)
            }
            // OP_HASH160 <20> OP_EQUAL
            [0xa9, 0x14, body @ .., 0x87] if body.len() == 20 => {
                hash.copy_from_slice(body);
                Self::new(scr_prefix::P2SH, hash)
            }
            // OP_0 <20>
            [0x00, 0x14, body @ ..] if body.len() == 20 => {
                hash.copy_from_slice(body);
                Self::new(scr_prefix::P2WPKH, hash)
            }
            _ => {
                let digest = Sha256::digest(script);
                hash.copy_from_slice(&digest[..20]);
                Self::new(scr_prefix::NON_STANDARD, hash)
            }
        }
    }

    /// Parse from the 21-byte wire form.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SCR_ADDR_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Standard P2PKH script paying to this address, if it is P2PKH.
    #[must_use]
    pub fn p2pkh_script(&self) -> Option<Vec<u8>> {
        if self.0[0] != scr_prefix::P2PKH {
            return None;
        }
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&self.0[1..]);
        script.extend_from_slice(&[0x88, 0xac]);
        Some(script)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }
}

impl fmt::Display for ScrAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ScrAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScrAddr({self})")
    }
}

mod scr_addr_bytes {
    use super::SCR_ADDR_LEN;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; SCR_ADDR_LEN], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; SCR_ADDR_LEN], D::Error> {
        let raw: Vec<u8> = Vec::deserialize(d)?;
        raw.as_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(raw.len(), &"21 bytes"))
    }
}

// =============================================================================
// OUTPOINTS AND UTXOS
// =============================================================================

/// An unspent output as returned to clients.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Hash of the funding transaction.
    #[serde_as(as = "Bytes")]
    pub tx_hash: Hash,
    /// Output index in the funding transaction.
    pub tx_out_index: u32,
    /// Output value in satoshis.
    pub value: u64,
    /// Height of the funding block, `u32::MAX` when unconfirmed.
    pub height: u32,
    /// Index of the funding transaction in its block.
    pub tx_index: u16,
    /// Output script.
    pub script: Vec<u8>,
}

impl Utxo {
    #[must_use]
    pub fn is_zero_conf(&self) -> bool {
        self.height == u32::MAX
    }

    #[must_use]
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_hash, self.tx_out_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scr_addr_from_p2pkh_script() {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&[7u8; 20]);
        script.extend_from_slice(&[0x88, 0xac]);

        let addr = ScrAddr::from_script(&script);
        assert_eq!(addr.prefix(), scr_prefix::P2PKH);
        assert_eq!(&addr.as_bytes()[1..], &[7u8; 20]);
        assert_eq!(addr.p2pkh_script(), Some(script));
    }

    #[test]
    fn test_scr_addr_from_p2sh_and_p2wpkh() {
        let mut p2sh = vec![0xa9, 0x14];
        p2sh.extend_from_slice(&[1u8; 20]);
        p2sh.push(0x87);
        assert_eq!(ScrAddr::from_script(&p2sh).prefix(), scr_prefix::P2SH);

        let mut p2wpkh = vec![0x00, 0x14];
        p2wpkh.extend_from_slice(&[2u8; 20]);
        assert_eq!(ScrAddr::from_script(&p2wpkh).prefix(), scr_prefix::P2WPKH);
    }

    #[test]
    fn test_scr_addr_non_standard_is_hashed() {
        let a = ScrAddr::from_script(&[0x6a, 0x01, 0x02]);
        let b = ScrAddr::from_script(&[0x6a, 0x01, 0x03]);
        assert_eq!(a.prefix(), scr_prefix::NON_STANDARD);
        assert_ne!(a, b);
        assert!(a.p2pkh_script().is_none());
    }

    #[test]
    fn test_scr_addr_from_slice_rejects_wrong_length() {
        assert!(ScrAddr::from_slice(&[0u8; 20]).is_none());
        assert!(ScrAddr::from_slice(&[0u8; 21]).is_some());
    }

    #[test]
    fn test_hash_hex_is_reversed() {
        let mut hash = [0u8; 32];
        hash[0] = 0xab;
        assert!(hash_to_hex(&hash).ends_with("ab"));
    }
}
