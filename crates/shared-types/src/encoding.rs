//! # Binary Encoding Helpers
//!
//! Little-endian cursor reads and Bitcoin-style variable length integers,
//! shared by the transaction parser and the wire packet format.

use crate::errors::TxParseError;

/// Append a Bitcoin varint.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Number of bytes `write_varint` emits for `value`.
#[must_use]
pub fn varint_len(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Forward-only reader over a byte slice.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `TxParseError::UnexpectedEof` when fewer bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], TxParseError> {
        if self.remaining() < len {
            return Err(TxParseError::UnexpectedEof {
                offset: self.pos,
                wanted: len,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Take everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8, TxParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, TxParseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, TxParseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, TxParseError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_hash(&mut self) -> Result<[u8; 32], TxParseError> {
        let b = self.take(32)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(b);
        Ok(arr)
    }

    /// Read a Bitcoin varint.
    pub fn read_varint(&mut self) -> Result<u64, TxParseError> {
        match self.read_u8()? {
            0xFD => Ok(u64::from(self.read_u16_le()?)),
            0xFE => Ok(u64::from(self.read_u32_le()?)),
            0xFF => self.read_u64_le(),
            n => Ok(u64::from(n)),
        }
    }

    /// Read a varint-prefixed byte string no longer than `max`.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<&'a [u8], TxParseError> {
        let len = self.read_varint()?;
        if len > max as u64 {
            return Err(TxParseError::LengthOutOfRange { len, max });
        }
        self.take(len as usize)
    }
}
