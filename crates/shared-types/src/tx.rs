//! # Raw Transactions
//!
//! Decoding and encoding of legacy-serialized transactions. Only structure is
//! checked here; scripts and signatures are never evaluated.

use crate::encoding::{write_varint, ByteReader};
use crate::entities::{double_sha256, Hash, OutPoint, ScrAddr};
use crate::errors::TxParseError;

/// Largest script accepted by the parser.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Largest input or output count accepted by the parser.
pub const MAX_IO_COUNT: usize = 100_000;

/// Sequence numbers below this value signal opt-in replace-by-fee.
pub const RBF_SEQUENCE_THRESHOLD: u32 = 0xFFFF_FFFE;

/// One transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub outpoint: OutPoint,
    pub script: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// Inputs of a coinbase spend the null outpoint.
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.outpoint.hash == [0u8; 32] && self.outpoint.index == u32::MAX
    }
}

/// One transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script: Vec<u8>,
}

impl TxOut {
    #[must_use]
    pub fn scr_addr(&self) -> ScrAddr {
        ScrAddr::from_script(&self.script)
    }
}

/// A decoded transaction together with its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    hash: Hash,
}

impl Transaction {
    /// Build a transaction from parts, computing its hash.
    #[must_use]
    pub fn new(version: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        let mut tx = Self {
            version,
            inputs,
            outputs,
            lock_time,
            hash: [0u8; 32],
        };
        tx.hash = double_sha256(&tx.serialize());
        tx
    }

    /// Decode a raw transaction.
    ///
    /// # Errors
    ///
    /// Returns `TxParseError` on truncated data, out-of-range lengths, a
    /// transaction without inputs or outputs, or trailing bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, TxParseError> {
        let mut reader = ByteReader::new(raw);
        let version = reader.read_u32_le()?;

        let input_count = read_count(&mut reader)?;
        if input_count == 0 {
            return Err(TxParseError::Empty("inputs"));
        }
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let hash = reader.read_hash()?;
            let index = reader.read_u32_le()?;
            let script = reader.read_var_bytes(MAX_SCRIPT_SIZE)?.to_vec();
            let sequence = reader.read_u32_le()?;
            inputs.push(TxIn {
                outpoint: OutPoint::new(hash, index),
                script,
                sequence,
            });
        }

        let output_count = read_count(&mut reader)?;
        if output_count == 0 {
            return Err(TxParseError::Empty("outputs"));
        }
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = reader.read_u64_le()?;
            let script = reader.read_var_bytes(MAX_SCRIPT_SIZE)?.to_vec();
            outputs.push(TxOut { value, script });
        }

        let lock_time = reader.read_u32_le()?;
        if reader.remaining() != 0 {
            return Err(TxParseError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
            hash: double_sha256(raw),
        })
    }

    /// Encode to the raw wire form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(&input.outpoint.hash);
            out.extend_from_slice(&input.outpoint.index.to_le_bytes());
            write_varint(&mut out, input.script.len() as u64);
            out.extend_from_slice(&input.script);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_varint(&mut out, output.script.len() as u64);
            out.extend_from_slice(&output.script);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    #[must_use]
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// True when any input opts into replace-by-fee.
    #[must_use]
    pub fn is_rbf(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| input.sequence < RBF_SEQUENCE_THRESHOLD)
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    #[must_use]
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

fn read_count(reader: &mut ByteReader<'_>) -> Result<usize, TxParseError> {
    let count = reader.read_varint()?;
    if count > MAX_IO_COUNT as u64 {
        return Err(TxParseError::LengthOutOfRange {
            len: count,
            max: MAX_IO_COUNT,
        });
    }
    Ok(count as usize)
}

/// Small builder used by adapters and tests to assemble transactions.
#[derive(Debug, Default)]
pub struct TxBuilder {
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    lock_time: u32,
}

impl TxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `outpoint` with a final sequence.
    #[must_use]
    pub fn spend(self, outpoint: OutPoint) -> Self {
        self.spend_with_sequence(outpoint, u32::MAX)
    }

    #[must_use]
    pub fn spend_with_sequence(mut self, outpoint: OutPoint, sequence: u32) -> Self {
        self.inputs.push(TxIn {
            outpoint,
            script: Vec::new(),
            sequence,
        });
        self
    }

    /// Coinbase input; `tag` keeps coinbase hashes distinct.
    #[must_use]
    pub fn coinbase(mut self, tag: u32) -> Self {
        self.inputs.push(TxIn {
            outpoint: OutPoint::new([0u8; 32], u32::MAX),
            script: tag.to_le_bytes().to_vec(),
            sequence: u32::MAX,
        });
        self
    }

    #[must_use]
    pub fn pay(mut self, script: Vec<u8>, value: u64) -> Self {
        self.outputs.push(TxOut { value, script });
        self
    }

    #[must_use]
    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    #[must_use]
    pub fn build(self) -> Transaction {
        Transaction::new(1, self.inputs, self.outputs, self.lock_time)
    }
}
