//! # Commands
//!
//! Clients send a generic [`CommandEnvelope`]: an integer method selector
//! plus optional typed fields. It is checked once, at the boundary, into a
//! [`Command`] so the handlers match exhaustively on typed variants.
//!
//! Byte blob conventions in `bin_args`:
//! - addresses are 21-byte `ScrAddr`s
//! - outpoints are a 32-byte tx hash followed by a `u32 LE` output index
//! - raw transactions are passed as-is

use super::errors::{PacketError, SessionError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::entities::{Hash, OutPoint, ScrAddr};

/// Wire selectors.
pub mod method {
    pub const GO_ONLINE: u32 = 1;
    pub const GET_TOP_BLOCK_HEIGHT: u32 = 2;
    pub const GET_HISTORY_PAGE: u32 = 3;
    pub const GET_PAGE_COUNT: u32 = 4;
    pub const REGISTER_WALLET: u32 = 5;
    pub const REGISTER_LOCKBOX: u32 = 6;
    pub const GET_LEDGER_DELEGATE_FOR_WALLETS: u32 = 7;
    pub const GET_LEDGER_DELEGATE_FOR_LOCKBOXES: u32 = 8;
    pub const GET_LEDGER_DELEGATE_FOR_SCR_ADDR: u32 = 9;
    pub const GET_BALANCES_AND_COUNT: u32 = 10;
    pub const GET_SPENDABLE_TX_OUT_LIST_FOR_VALUE: u32 = 11;
    pub const GET_SPENDABLE_ZC_LIST: u32 = 12;
    pub const GET_RBF_TX_OUT_LIST: u32 = 13;
    pub const BROADCAST_ZC: u32 = 14;
    pub const GET_ADDR_TXN_COUNTS: u32 = 15;
    pub const GET_ADDR_BALANCES: u32 = 16;
    pub const GET_TX_BY_HASH: u32 = 17;
    pub const GET_ADDRESS_FULL_BALANCE: u32 = 18;
    pub const GET_ADDRESS_TXIO_COUNT: u32 = 19;
    pub const GET_HEADER_BY_HEIGHT: u32 = 20;
    pub const GET_HEADER_BY_HASH: u32 = 21;
    pub const CREATE_ADDRESS_BOOK: u32 = 22;
    pub const UPDATE_WALLETS_LEDGER_FILTER: u32 = 23;
    pub const GET_NODE_STATUS: u32 = 24;
    pub const ESTIMATE_FEE: u32 = 25;
    pub const GET_HISTORY_FOR_WALLET_SELECTION: u32 = 26;
    pub const BROADCAST_THROUGH_RPC: u32 = 27;
    pub const GET_UTXOS_FOR_ADDR_LIST: u32 = 28;
    pub const GET_OUTPOINT_SPENTNESS: u32 = 29;
    pub const UNREGISTER_BDV: u32 = 30;
    pub const GET_SPENDABLE_TX_OUT_LIST_FOR_ADDR: u32 = 31;

    pub const REGISTER_BDV: u32 = 100;
    pub const SHUTDOWN: u32 = 101;
    pub const SHUTDOWN_NODE: u32 = 102;
}

/// A command as it travels on the wire.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub method: u32,
    /// Required for every non-static command.
    pub session_id: Option<String>,
    /// Wallet id, or ledger delegate id for page requests.
    pub wallet_id: Option<String>,
    #[serde_as(as = "Option<Bytes>")]
    pub hash: Option<Hash>,
    pub height: Option<u32>,
    pub value: Option<u64>,
    pub page_id: Option<u32>,
    /// `is_new` on registrations, `rebuild` on page requests.
    pub flag: Option<bool>,
    pub remap: Option<bool>,
    pub registration_id: Option<String>,
    /// Fee estimation strategy.
    pub strategy: Option<String>,
    pub ids: Vec<String>,
    pub bin_args: Vec<Vec<u8>>,
}

impl CommandEnvelope {
    pub fn new(method: u32) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn wallet_id(&self) -> Result<String, SessionError> {
        self.wallet_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingField("wallet_id"))
    }

    fn hash(&self) -> Result<Hash, SessionError> {
        self.hash.ok_or(SessionError::MissingField("hash"))
    }

    fn first_blob(&self) -> Result<Vec<u8>, SessionError> {
        self.bin_args
            .first()
            .cloned()
            .ok_or(SessionError::MissingField("bin_args"))
    }

    fn addresses(&self) -> Result<Vec<ScrAddr>, SessionError> {
        self.bin_args
            .iter()
            .map(|raw| {
                ScrAddr::from_slice(raw).ok_or_else(|| {
                    SessionError::InvalidRequest(format!("address of {} bytes", raw.len()))
                })
            })
            .collect()
    }

    fn address(&self) -> Result<ScrAddr, SessionError> {
        let raw = self.first_blob()?;
        ScrAddr::from_slice(&raw)
            .ok_or_else(|| SessionError::InvalidRequest(format!("address of {} bytes", raw.len())))
    }

    fn outpoints(&self) -> Result<Vec<OutPoint>, SessionError> {
        self.bin_args
            .iter()
            .map(|raw| {
                if raw.len() != 36 {
                    return Err(SessionError::InvalidRequest(format!(
                        "outpoint of {} bytes",
                        raw.len()
                    )));
                }
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&raw[..32]);
                let mut index = [0u8; 4];
                index.copy_from_slice(&raw[32..]);
                Ok(OutPoint::new(hash, u32::from_le_bytes(index)))
            })
            .collect()
    }

    fn registration(&self) -> Result<Registration, SessionError> {
        Ok(Registration {
            wallet_id: self.wallet_id()?,
            addresses: self.addresses()?,
            is_new: self.flag.unwrap_or(false),
            registration_id: self.registration_id.clone().unwrap_or_default(),
        })
    }
}

/// Addresses merged into one wallet or lockbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub wallet_id: String,
    pub addresses: Vec<ScrAddr>,
    pub is_new: bool,
    /// Empty means no completion notification.
    pub registration_id: String,
}

/// Commands available to a registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GoOnline,
    GetTopBlockHeight,
    GetHistoryPage {
        delegate_id: String,
        page_id: u32,
        rebuild: bool,
        remap: bool,
    },
    GetPageCount {
        delegate_id: String,
    },
    RegisterWallet(Registration),
    RegisterLockbox(Registration),
    GetLedgerDelegateForWallets,
    GetLedgerDelegateForLockboxes,
    GetLedgerDelegateForScrAddr(ScrAddr),
    GetBalancesAndCount(String),
    GetSpendableTxOutListForValue {
        wallet_id: String,
        value: u64,
    },
    GetSpendableTxOutListForAddr {
        wallet_id: String,
        addr: ScrAddr,
    },
    GetSpendableZcList(String),
    GetRbfTxOutList(String),
    BroadcastZc(Vec<u8>),
    GetAddrTxnCounts(String),
    GetAddrBalances(String),
    GetTxByHash(Hash),
    GetAddressFullBalance(ScrAddr),
    GetAddressTxioCount(ScrAddr),
    GetHeaderByHeight(u32),
    GetHeaderByHash(Hash),
    CreateAddressBook(String),
    UpdateWalletsLedgerFilter(Vec<String>),
    GetNodeStatus,
    EstimateFee {
        blocks: u32,
        strategy: String,
    },
    GetHistoryForWalletSelection(Vec<String>),
    BroadcastThroughRpc(Vec<u8>),
    GetUtxosForAddrList(Vec<ScrAddr>),
    GetOutpointSpentness(Vec<OutPoint>),
    UnregisterBdv,
}

impl Request {
    /// Registrations run even while earlier registrations are pending.
    #[must_use]
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::RegisterWallet(_) | Self::RegisterLockbox(_))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GoOnline => "go_online",
            Self::GetTopBlockHeight => "get_top_block_height",
            Self::GetHistoryPage { .. } => "get_history_page",
            Self::GetPageCount { .. } => "get_page_count",
            Self::RegisterWallet(_) => "register_wallet",
            Self::RegisterLockbox(_) => "register_lockbox",
            Self::GetLedgerDelegateForWallets => "get_ledger_delegate_for_wallets",
            Self::GetLedgerDelegateForLockboxes => "get_ledger_delegate_for_lockboxes",
            Self::GetLedgerDelegateForScrAddr(_) => "get_ledger_delegate_for_scr_addr",
            Self::GetBalancesAndCount(_) => "get_balances_and_count",
            Self::GetSpendableTxOutListForValue { .. } => "get_spendable_tx_out_list_for_value",
            Self::GetSpendableTxOutListForAddr { .. } => "get_spendable_tx_out_list_for_addr",
            Self::GetSpendableZcList(_) => "get_spendable_zc_list",
            Self::GetRbfTxOutList(_) => "get_rbf_tx_out_list",
            Self::BroadcastZc(_) => "broadcast_zc",
            Self::GetAddrTxnCounts(_) => "get_addr_txn_counts",
            Self::GetAddrBalances(_) => "get_addr_balances",
            Self::GetTxByHash(_) => "get_tx_by_hash",
            Self::GetAddressFullBalance(_) => "get_address_full_balance",
            Self::GetAddressTxioCount(_) => "get_address_txio_count",
            Self::GetHeaderByHeight(_) => "get_header_by_height",
            Self::GetHeaderByHash(_) => "get_header_by_hash",
            Self::CreateAddressBook(_) => "create_address_book",
            Self::UpdateWalletsLedgerFilter(_) => "update_wallets_ledger_filter",
            Self::GetNodeStatus => "get_node_status",
            Self::EstimateFee { .. } => "estimate_fee",
            Self::GetHistoryForWalletSelection(_) => "get_history_for_wallet_selection",
            Self::BroadcastThroughRpc(_) => "broadcast_through_rpc",
            Self::GetUtxosForAddrList(_) => "get_utxos_for_addr_list",
            Self::GetOutpointSpentness(_) => "get_outpoint_spentness",
            Self::UnregisterBdv => "unregister_bdv",
        }
    }
}

/// Commands an unregistered connection may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticRequest {
    /// Network magic word; answered with a new session id.
    RegisterBdv(Vec<u8>),
    /// Stop accepting connections; gated by the cookie.
    Shutdown(String),
    /// Stop the whole node; gated by the cookie.
    ShutdownNode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Static(StaticRequest),
    Session { session_id: String, request: Request },
}

impl TryFrom<CommandEnvelope> for Command {
    type Error = SessionError;

    fn try_from(env: CommandEnvelope) -> Result<Self, Self::Error> {
        use method::*;

        let cookie = |env: &CommandEnvelope| {
            env.ids
                .first()
                .cloned()
                .ok_or(SessionError::MissingField("ids"))
        };
        match env.method {
            REGISTER_BDV => return Ok(Self::Static(StaticRequest::RegisterBdv(env.first_blob()?))),
            SHUTDOWN => return Ok(Self::Static(StaticRequest::Shutdown(cookie(&env)?))),
            SHUTDOWN_NODE => return Ok(Self::Static(StaticRequest::ShutdownNode(cookie(&env)?))),
            _ => {}
        }

        let session_id = env
            .session_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingField("session_id"))?;
        let request = match env.method {
            GO_ONLINE => Request::GoOnline,
            GET_TOP_BLOCK_HEIGHT => Request::GetTopBlockHeight,
            GET_HISTORY_PAGE => Request::GetHistoryPage {
                delegate_id: env.wallet_id()?,
                page_id: env.page_id.ok_or(SessionError::MissingField("page_id"))?,
                rebuild: env.flag.unwrap_or(false),
                remap: env.remap.unwrap_or(false),
            },
            GET_PAGE_COUNT => Request::GetPageCount {
                delegate_id: env.wallet_id()?,
            },
            REGISTER_WALLET => Request::RegisterWallet(env.registration()?),
            REGISTER_LOCKBOX => Request::RegisterLockbox(env.registration()?),
            GET_LEDGER_DELEGATE_FOR_WALLETS => Request::GetLedgerDelegateForWallets,
            GET_LEDGER_DELEGATE_FOR_LOCKBOXES => Request::GetLedgerDelegateForLockboxes,
            GET_LEDGER_DELEGATE_FOR_SCR_ADDR => Request::GetLedgerDelegateForScrAddr(env.address()?),
            GET_BALANCES_AND_COUNT => Request::GetBalancesAndCount(env.wallet_id()?),
            GET_SPENDABLE_TX_OUT_LIST_FOR_VALUE => Request::GetSpendableTxOutListForValue {
                wallet_id: env.wallet_id()?,
                value: env.value.ok_or(SessionError::MissingField("value"))?,
            },
            GET_SPENDABLE_TX_OUT_LIST_FOR_ADDR => Request::GetSpendableTxOutListForAddr {
                wallet_id: env.wallet_id()?,
                addr: env.address()?,
            },
            GET_SPENDABLE_ZC_LIST => Request::GetSpendableZcList(env.wallet_id()?),
            GET_RBF_TX_OUT_LIST => Request::GetRbfTxOutList(env.wallet_id()?),
            BROADCAST_ZC => Request::BroadcastZc(env.first_blob()?),
            GET_ADDR_TXN_COUNTS => Request::GetAddrTxnCounts(env.wallet_id()?),
            GET_ADDR_BALANCES => Request::GetAddrBalances(env.wallet_id()?),
            GET_TX_BY_HASH => Request::GetTxByHash(env.hash()?),
            GET_ADDRESS_FULL_BALANCE => Request::GetAddressFullBalance(env.address()?),
            GET_ADDRESS_TXIO_COUNT => Request::GetAddressTxioCount(env.address()?),
            GET_HEADER_BY_HEIGHT => {
                Request::GetHeaderByHeight(env.height.ok_or(SessionError::MissingField("height"))?)
            }
            GET_HEADER_BY_HASH => Request::GetHeaderByHash(env.hash()?),
            CREATE_ADDRESS_BOOK => Request::CreateAddressBook(env.wallet_id()?),
            UPDATE_WALLETS_LEDGER_FILTER => Request::UpdateWalletsLedgerFilter(env.ids),
            GET_NODE_STATUS => Request::GetNodeStatus,
            ESTIMATE_FEE => Request::EstimateFee {
                blocks: env.height.ok_or(SessionError::MissingField("height"))?,
                strategy: env.strategy.unwrap_or_else(|| "CONSERVATIVE".into()),
            },
            GET_HISTORY_FOR_WALLET_SELECTION => {
                if env.ids.is_empty() {
                    return Err(SessionError::MissingField("ids"));
                }
                Request::GetHistoryForWalletSelection(env.ids)
            }
            BROADCAST_THROUGH_RPC => Request::BroadcastThroughRpc(env.first_blob()?),
            GET_UTXOS_FOR_ADDR_LIST => Request::GetUtxosForAddrList(env.addresses()?),
            GET_OUTPOINT_SPENTNESS => Request::GetOutpointSpentness(env.outpoints()?),
            UNREGISTER_BDV => Request::UnregisterBdv,
            other => return Err(SessionError::UnknownMethod(other)),
        };
        Ok(Self::Session {
            session_id,
            request,
        })
    }
}

/// Decode message bytes into an envelope.
pub fn decode_envelope(bytes: &[u8]) -> Result<CommandEnvelope, SessionError> {
    bincode::deserialize(bytes)
        .map_err(|e| SessionError::Packet(PacketError::Codec(e.to_string())))
}

/// Encode an envelope into message bytes.
pub fn encode_envelope(envelope: &CommandEnvelope) -> Result<Vec<u8>, SessionError> {
    bincode::serialize(envelope)
        .map_err(|e| SessionError::Packet(PacketError::Codec(e.to_string())))
}
