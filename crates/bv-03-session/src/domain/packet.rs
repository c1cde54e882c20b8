//! # Wire Packets
//!
//! Every transport frame carries one packet. A logical message either fits
//! in a `Single` packet or is split into a `FragmentHeader` (sequence 0,
//! carrying the fragment count) and `Fragment`s numbered `1..count`.
//!
//! ```text
//! Single          | 0 | msg_id u32 LE | message bytes         |
//! FragmentHeader  | 1 | msg_id u32 LE | count u16 LE | bytes  |
//! Fragment        | 2 | msg_id u32 LE | seq varint   | bytes  |
//! ```

use super::errors::PacketError;
use shared_types::encoding::{write_varint, ByteReader};

/// Message id reserved for server-initiated notifications.
pub const CALLBACK_ID: u32 = u32::MAX;

/// Packet type bytes.
pub mod packet_type {
    pub const SINGLE: u8 = 0;
    pub const FRAGMENT_HEADER: u8 = 1;
    pub const FRAGMENT: u8 = 2;
}

/// Header bytes a fragment packet may need beyond its payload.
const FRAGMENT_OVERHEAD: usize = 1 + 4 + 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Single {
        msg_id: u32,
        data: Vec<u8>,
    },
    FragmentHeader {
        msg_id: u32,
        count: u16,
        data: Vec<u8>,
    },
    Fragment {
        msg_id: u32,
        seq: u16,
        data: Vec<u8>,
    },
}

impl Packet {
    #[must_use]
    pub fn msg_id(&self) -> u32 {
        match self {
            Self::Single { msg_id, .. }
            | Self::FragmentHeader { msg_id, .. }
            | Self::Fragment { msg_id, .. } => *msg_id,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Single { msg_id, data } => {
                let mut out = Vec::with_capacity(5 + data.len());
                out.push(packet_type::SINGLE);
                out.extend_from_slice(&msg_id.to_le_bytes());
                out.extend_from_slice(data);
                out
            }
            Self::FragmentHeader {
                msg_id,
                count,
                data,
            } => {
                let mut out = Vec::with_capacity(7 + data.len());
                out.push(packet_type::FRAGMENT_HEADER);
                out.extend_from_slice(&msg_id.to_le_bytes());
                out.extend_from_slice(&count.to_le_bytes());
                out.extend_from_slice(data);
                out
            }
            Self::Fragment { msg_id, seq, data } => {
                let mut out = Vec::with_capacity(FRAGMENT_OVERHEAD + data.len());
                out.push(packet_type::FRAGMENT);
                out.extend_from_slice(&msg_id.to_le_bytes());
                write_varint(&mut out, u64::from(*seq));
                out.extend_from_slice(data);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut reader = ByteReader::new(bytes);
        let kind = reader.read_u8().map_err(|_| PacketError::Empty)?;
        let msg_id = reader.read_u32_le()?;
        match kind {
            packet_type::SINGLE => Ok(Self::Single {
                msg_id,
                data: reader.rest().to_vec(),
            }),
            packet_type::FRAGMENT_HEADER => {
                let count = reader.read_u16_le()?;
                if count < 2 {
                    return Err(PacketError::FragmentCount(count));
                }
                Ok(Self::FragmentHeader {
                    msg_id,
                    count,
                    data: reader.rest().to_vec(),
                })
            }
            packet_type::FRAGMENT => {
                let seq = reader.read_varint()?;
                let seq = u16::try_from(seq)
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(PacketError::Sequence {
                        msg_id,
                        seq,
                        count: 0,
                    })?;
                Ok(Self::Fragment {
                    msg_id,
                    seq,
                    data: reader.rest().to_vec(),
                })
            }
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// Split `message` into packets of at most `packet_size` bytes.
pub fn fragment(msg_id: u32, message: &[u8], packet_size: usize) -> Result<Vec<Packet>, PacketError> {
    if packet_size <= FRAGMENT_OVERHEAD {
        return Err(PacketError::PacketSize(packet_size));
    }
    if message.len() + 5 <= packet_size {
        return Ok(vec![Packet::Single {
            msg_id,
            data: message.to_vec(),
        }]);
    }

    let chunk = packet_size - FRAGMENT_OVERHEAD;
    let count = message.len().div_ceil(chunk);
    let count = u16::try_from(count).map_err(|_| PacketError::TooLarge {
        len: message.len(),
        max: usize::from(u16::MAX),
    })?;

    let packets = message
        .chunks(chunk)
        .enumerate()
        .map(|(i, data)| match i {
            0 => Packet::FragmentHeader {
                msg_id,
                count,
                data: data.to_vec(),
            },
            // i < count <= u16::MAX
            _ => Packet::Fragment {
                msg_id,
                seq: i as u16,
                data: data.to_vec(),
            },
        })
        .collect();
    Ok(packets)
}
