//! # Server Messages
//!
//! Everything the server sends: a [`Response`] echoing a request's message
//! id, or a [`Notification`] pushed under [`CALLBACK_ID`](super::packet::CALLBACK_ID).

use super::errors::{PacketError, SessionError};
use bv_02_wallet_view::{AddressBookEntry, Balances, BalancesAndCount, Spentness, TxInfo};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_bus::RefreshType;
use shared_types::entities::{Hash, ScrAddr, Utxo};
use shared_types::keys::TxKey;
use shared_types::ledger::LedgerEntry;
use shared_types::ports::{FeeEstimate, NodeStatus};

/// Reply to one command.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Acknowledgement with no payload.
    Empty,
    Height(u32),
    Count(u64),
    /// A session id or a ledger delegate id.
    Id(String),
    LedgerEntries(Vec<LedgerEntry>),
    BalancesAndCount(BalancesAndCount),
    AddrBalances(Vec<(ScrAddr, Balances)>),
    AddrCounts(Vec<(ScrAddr, u64)>),
    Utxos(Vec<Utxo>),
    Tx(TxInfo),
    Binary(Vec<u8>),
    Hash(#[serde_as(as = "Bytes")] Hash),
    Strings(Vec<String>),
    AddressBook(Vec<AddressBookEntry>),
    Spentness(Vec<Spentness>),
    NodeStatus(NodeStatus),
    FeeEstimate(FeeEstimate),
    Error { code: i32, message: String },
}

impl Response {
    pub fn from_error(err: &SessionError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Server-initiated push.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Ready {
        height: u32,
    },
    NewBlock {
        height: u32,
        branch_height: Option<u32>,
        invalidated: Vec<TxKey>,
    },
    ZeroConf {
        entries: Vec<LedgerEntry>,
        invalidated: Vec<TxKey>,
    },
    Refresh {
        refresh_type: RefreshType,
        ids: Vec<String>,
    },
    Progress {
        phase: u32,
        progress: f32,
        seconds_remaining: u32,
        numeric_progress: u32,
    },
    NodeStatus(NodeStatus),
    Error {
        message: String,
        code: i32,
        #[serde_as(as = "Option<Bytes>")]
        tx_hash: Option<Hash>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Response(Response),
    Notification(Notification),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        bincode::serialize(self).map_err(|e| PacketError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        bincode::deserialize(bytes).map_err(|e| PacketError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_code() {
        let err = SessionError::MissingField("wallet_id");
        let Response::Error { code, message } = Response::from_error(&err) else {
            panic!("error response expected");
        };
        assert_eq!(code, err.code());
        assert!(message.contains("wallet_id"));
    }

    #[test]
    fn test_notification_encoding() {
        let message = ServerMessage::Notification(Notification::Error {
            message: "rejected".into(),
            code: -30_001,
            tx_hash: Some([3u8; 32]),
        });
        let bytes = message.encode().unwrap();
        assert_eq!(ServerMessage::decode(&bytes).unwrap(), message);
        assert!(ServerMessage::decode(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
