//! # Message Reassembly
//!
//! Per-connection buffer of partially received messages, keyed by message
//! id. A gap in one message's fragments never holds back another message.
//!
//! The buffer is bounded twice: by the number of partial messages and by
//! the bytes they hold. Each buffered fragment is charged its payload plus
//! `FRAGMENT_OVERHEAD`, so empty fragments still count. A fragment that
//! would push the total past the byte limit drops its whole message.

use super::errors::PacketError;
use super::packet::Packet;
use std::collections::BTreeMap;
use tracing::warn;

/// Default number of partial messages kept per connection.
pub const DEFAULT_MAX_PARTIAL: usize = 64;

/// Default bound on bytes held by partial messages of one connection.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 16 * 1024 * 1024;

/// Bytes charged per buffered fragment on top of its payload.
pub const FRAGMENT_OVERHEAD: usize = 32;

#[derive(Debug, Default)]
struct Partial {
    /// Known once the header fragment arrived.
    count: Option<u16>,
    fragments: BTreeMap<u16, Vec<u8>>,
    charged: usize,
}

impl Partial {
    fn is_complete(&self) -> bool {
        self.count
            .is_some_and(|count| self.fragments.len() == usize::from(count))
    }

    /// Drop fragments buffered before the header that lie past `count`.
    /// Returns the bytes released.
    fn trim_to(&mut self, count: u16) -> usize {
        let stray = self.fragments.split_off(&count);
        let released: usize = stray.values().map(|data| charge(data)).sum();
        self.charged -= released;
        released
    }

    fn assemble(self) -> Vec<u8> {
        self.fragments.into_values().flatten().collect()
    }
}

fn charge(data: &[u8]) -> usize {
    data.len() + FRAGMENT_OVERHEAD
}

#[derive(Debug)]
pub struct Reassembler {
    partial: BTreeMap<u32, Partial>,
    max_partial: usize,
    max_bytes: usize,
    buffered: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARTIAL)
    }
}

impl Reassembler {
    pub fn new(max_partial: usize) -> Self {
        Self::with_byte_limit(max_partial, DEFAULT_MAX_BUFFERED_BYTES)
    }

    pub fn with_byte_limit(max_partial: usize, max_bytes: usize) -> Self {
        Self {
            partial: BTreeMap::new(),
            max_partial: max_partial.max(1),
            max_bytes,
            buffered: 0,
        }
    }

    /// Feed one packet; returns `(msg_id, message)` once a message is whole.
    pub fn push(&mut self, packet: Packet) -> Result<Option<(u32, Vec<u8>)>, PacketError> {
        let msg_id = packet.msg_id();
        let (seq, count, data) = match packet {
            Packet::Single { data, .. } => return Ok(Some((msg_id, data))),
            Packet::FragmentHeader { count, data, .. } => (0, Some(count), data),
            Packet::Fragment { seq, data, .. } => (seq, None, data),
        };

        if !self.partial.contains_key(&msg_id) && self.partial.len() >= self.max_partial {
            if let Some(dropped) = self.partial.keys().next().copied() {
                self.discard(dropped);
                warn!(msg_id = dropped, "Reassembly buffer full, partial message dropped");
            }
        }
        let entry = self.partial.entry(msg_id).or_default();
        if let Some(count) = count {
            if entry.count.is_none() {
                let released = entry.trim_to(count);
                if released > 0 {
                    warn!(msg_id, count, "Fragments past the announced count discarded");
                }
                self.buffered -= released;
            }
            entry.count = Some(count);
        }
        if let Some(count) = entry.count {
            if seq >= count {
                self.discard(msg_id);
                return Err(PacketError::Sequence {
                    msg_id,
                    seq: u64::from(seq),
                    count,
                });
            }
        }

        let cost = charge(&data);
        let replaced = entry.fragments.get(&seq).map_or(0, |old| charge(old));
        let buffered = self.buffered - replaced + cost;
        if buffered > self.max_bytes {
            self.discard(msg_id);
            return Err(PacketError::BufferFull {
                msg_id,
                limit: self.max_bytes,
            });
        }

        let entry = self.partial.entry(msg_id).or_default();
        let highest = entry.fragments.last_key_value().map(|(s, _)| *s);
        if let Some(highest) = highest {
            if seq > highest.saturating_add(1) {
                warn!(msg_id, seq, expected = highest + 1, "Fragment gap");
            }
        }
        entry.fragments.insert(seq, data);
        entry.charged = entry.charged - replaced + cost;
        self.buffered = buffered;

        if entry.is_complete() {
            let whole = self.take(msg_id);
            return Ok(whole.map(|message| (msg_id, message)));
        }
        Ok(None)
    }

    fn take(&mut self, msg_id: u32) -> Option<Vec<u8>> {
        let partial = self.partial.remove(&msg_id)?;
        self.buffered -= partial.charged;
        Some(partial.assemble())
    }

    fn discard(&mut self, msg_id: u32) {
        if let Some(partial) = self.partial.remove(&msg_id) {
            self.buffered -= partial.charged;
        }
    }

    /// Messages still waiting for fragments.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Bytes charged to partial messages.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }
}
