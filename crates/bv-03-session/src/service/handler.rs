//! Request execution against a session's wallet view.

use crate::domain::{Registration, Request, Response, SessionError};
use bv_02_wallet_view::{DelegateTarget, GroupKind, WalletViewApi};

/// Run one request against the session's view.
pub(crate) async fn execute(
    view: &dyn WalletViewApi,
    request: Request,
) -> Result<Response, SessionError> {
    let response = match request {
        Request::GoOnline => Response::Height(view.go_online().await?),
        Request::GetTopBlockHeight => Response::Height(view.top_height()),
        Request::GetHistoryPage {
            delegate_id,
            page_id,
            rebuild,
            remap,
        } => Response::LedgerEntries(view.history_page(
            &delegate_id,
            page_id as usize,
            rebuild,
            remap,
        )?),
        Request::GetPageCount { delegate_id } => {
            Response::Count(view.page_count(&delegate_id)? as u64)
        }
        Request::RegisterWallet(reg) => register(view, GroupKind::Wallets, reg)?,
        Request::RegisterLockbox(reg) => register(view, GroupKind::Lockboxes, reg)?,
        Request::GetLedgerDelegateForWallets => Response::Id(
            view.ledger_delegate(DelegateTarget::Group(GroupKind::Wallets))?,
        ),
        Request::GetLedgerDelegateForLockboxes => Response::Id(
            view.ledger_delegate(DelegateTarget::Group(GroupKind::Lockboxes))?,
        ),
        Request::GetLedgerDelegateForScrAddr(addr) => {
            Response::Id(view.ledger_delegate(DelegateTarget::Address(addr))?)
        }
        Request::GetBalancesAndCount(wallet_id) => {
            Response::BalancesAndCount(view.balances_and_count(&wallet_id)?)
        }
        Request::GetSpendableTxOutListForValue { wallet_id, value } => {
            Response::Utxos(view.spendable_txouts_for_value(&wallet_id, value)?)
        }
        Request::GetSpendableTxOutListForAddr { wallet_id, addr } => {
            Response::Utxos(view.spendable_txouts_for_addr(&wallet_id, &addr)?)
        }
        Request::GetSpendableZcList(wallet_id) => {
            Response::Utxos(view.spendable_zc_list(&wallet_id)?)
        }
        Request::GetRbfTxOutList(wallet_id) => Response::Utxos(view.rbf_txout_list(&wallet_id)?),
        Request::BroadcastZc(raw) => {
            view.broadcast_zc(raw).await?;
            Response::Empty
        }
        Request::GetAddrTxnCounts(wallet_id) => {
            Response::AddrCounts(view.addr_txn_counts(&wallet_id)?.into_iter().collect())
        }
        Request::GetAddrBalances(wallet_id) => {
            Response::AddrBalances(view.addr_balances(&wallet_id)?.into_iter().collect())
        }
        Request::GetTxByHash(hash) => Response::Tx(view.tx_by_hash(&hash)?),
        Request::GetAddressFullBalance(addr) => Response::Count(view.address_full_balance(&addr)?),
        Request::GetAddressTxioCount(addr) => Response::Count(view.address_txio_count(&addr)?),
        Request::GetHeaderByHeight(height) => Response::Binary(view.header_by_height(height)?),
        Request::GetHeaderByHash(hash) => Response::Binary(view.header_by_hash(&hash)?),
        Request::CreateAddressBook(wallet_id) => {
            Response::AddressBook(view.create_address_book(&wallet_id)?)
        }
        Request::UpdateWalletsLedgerFilter(ids) => {
            view.update_wallets_ledger_filter(ids).await?;
            Response::Empty
        }
        Request::GetNodeStatus => Response::NodeStatus(view.node_status()),
        Request::EstimateFee { blocks, strategy } => {
            Response::FeeEstimate(view.estimate_fee(blocks, &strategy).await?)
        }
        Request::GetHistoryForWalletSelection(ids) => {
            Response::LedgerEntries(view.history_for_wallet_selection(&ids)?)
        }
        Request::BroadcastThroughRpc(raw) => {
            Response::Strings(vec![view.broadcast_through_rpc(raw).await?])
        }
        Request::GetUtxosForAddrList(addrs) => Response::Utxos(view.utxos_for_addr_list(&addrs)?),
        Request::GetOutpointSpentness(outpoints) => {
            Response::Spentness(view.outpoint_spentness(&outpoints)?)
        }
        // the session closes its view once the reply is written
        Request::UnregisterBdv => Response::Empty,
    };
    Ok(response)
}

/// Completion is reported later by a `Refresh` notification.
fn register(
    view: &dyn WalletViewApi,
    kind: GroupKind,
    reg: Registration,
) -> Result<Response, SessionError> {
    view.register_addresses(
        kind,
        &reg.wallet_id,
        reg.addresses,
        reg.is_new,
        &reg.registration_id,
    )?;
    Ok(Response::Empty)
}
