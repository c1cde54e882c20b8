use super::*;
use crate::domain::{DelegateTarget, GroupKind, ScanNotification, Spentness, ViewConfig, ViewError};
use crate::ports::WalletViewApi;
use bv_01_zero_conf::{ZeroConfApi, ZeroConfConfig, ZeroConfEngine};
use shared_bus::{EventFilter, EventTopic, InMemoryEventBus, IndexerEvent, RefreshType, Subscription};
use shared_types::entities::{OutPoint, ScrAddr};
use shared_types::keys::UNCONFIRMED_HEIGHT;
use shared_types::memory::{InMemoryChainStore, MemoryNodeFeed};
use shared_types::tx::{Transaction, TxBuilder};
use shared_types::ChainStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

// =============================================================================
// FIXTURES
// =============================================================================

fn script(tag: u8) -> Vec<u8> {
    let mut s = vec![0x76, 0xa9, 0x14];
    s.extend_from_slice(&[tag; 20]);
    s.extend_from_slice(&[0x88, 0xac]);
    s
}

fn addr(tag: u8) -> ScrAddr {
    ScrAddr::from_script(&script(tag))
}

struct Harness {
    store: Arc<InMemoryChainStore>,
    feed: Arc<MemoryNodeFeed>,
    bus: Arc<InMemoryEventBus>,
    engine: ZeroConfEngine,
    ctx: ViewContext,
    /// Genesis block: 5_000 to addr(1), 7_000 to addr(2), 3_000 to addr(2).
    coinbases: Vec<Transaction>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryChainStore::new());
        let coinbases = vec![
            TxBuilder::new().coinbase(0).pay(script(1), 5_000).build(),
            TxBuilder::new().coinbase(1).pay(script(2), 7_000).build(),
            TxBuilder::new().coinbase(2).pay(script(2), 3_000).build(),
        ];
        store.push_block(coinbases.clone(), 1_000);

        let feed = Arc::new(MemoryNodeFeed::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let filter = AddressFilter::start();
        let engine = ZeroConfEngine::start(
            ZeroConfConfig::default(),
            store.clone(),
            feed.clone(),
            bus.clone(),
            filter.clone(),
        );
        let ctx = ViewContext {
            store: store.clone(),
            feed: feed.clone(),
            zero_conf: Arc::new(engine.clone()),
            publisher: bus.clone(),
            filter,
        };
        Self {
            store,
            feed,
            bus,
            engine,
            ctx,
            coinbases,
        }
    }

    fn view(&self, session_id: &str) -> WalletView {
        WalletView::new(session_id, ViewConfig::default(), self.ctx.clone())
    }

    async fn online_view(&self, session_id: &str) -> WalletView {
        let view = self.view(session_id);
        view.register_addresses(GroupKind::Wallets, "w1", vec![addr(1), addr(2)], true, "")
            .unwrap();
        view.registrations_settled().await;
        view.go_online().await.unwrap();
        view
    }

    fn funding(&self, i: usize) -> OutPoint {
        OutPoint::new(self.coinbases[i].hash(), 0)
    }

    async fn announce(&self, tx: &Transaction) {
        let before = self.engine.snapshot().len();
        let hash = self.feed.relay(tx);
        self.engine
            .process_inv(vec![hash], true, Duration::from_millis(500))
            .await
            .expect("engine running");
        timeout(Duration::from_secs(2), async {
            while self.engine.snapshot().len() <= before {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tx accepted");
    }
}

async fn next_event(sub: &mut Subscription) -> IndexerEvent {
    timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("event in time")
        .expect("bus open")
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[tokio::test]
async fn test_registration_is_acknowledged_once() {
    let h = Harness::new();
    let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Wallet]));
    let view = h.view("s1");

    view.register_addresses(GroupKind::Wallets, "w1", vec![addr(1)], true, "reg-1")
        .unwrap();
    match next_event(&mut sub).await {
        IndexerEvent::Refresh {
            session_id,
            refresh_type,
            ids,
        } => {
            assert_eq!(session_id, "s1");
            assert_eq!(refresh_type, RefreshType::Registration);
            assert_eq!(ids, vec!["reg-1".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    view.registrations_settled().await;
    assert!(!view.is_registering());
    assert!(h.ctx.filter.is_watched(&addr(1)));

    // same id again: nothing new to watch and already acknowledged
    view.register_addresses(GroupKind::Wallets, "w1", vec![addr(1)], false, "reg-1")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sub.try_recv().unwrap().is_none());
}

#[tokio::test]
async fn test_registration_rejects_bad_ids() {
    let h = Harness::new();
    let view = h.view("s1");
    assert!(matches!(
        view.register_addresses(GroupKind::Wallets, "", vec![addr(1)], true, ""),
        Err(ViewError::InvalidRequest(_))
    ));

    view.register_addresses(GroupKind::Lockboxes, "lb", vec![addr(3)], true, "")
        .unwrap();
    assert!(matches!(
        view.register_addresses(GroupKind::Wallets, "lb", vec![addr(4)], true, ""),
        Err(ViewError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_registration_folds_existing_zero_conf() {
    let h = Harness::new();
    let funder = h.online_view("funder").await;

    // pays addr(5), which nobody watches yet
    let tx = TxBuilder::new()
        .spend(h.funding(0))
        .pay(script(5), 4_500)
        .build();
    h.announce(&tx).await;
    assert!(funder.balances_and_count("w1").unwrap().balances.full < 15_000);

    let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::ZeroConf]));
    let late = h.view("late");
    late.register_addresses(GroupKind::Wallets, "w9", vec![addr(5)], true, "")
        .unwrap();
    late.registrations_settled().await;

    // the funder's own notification may still be in flight
    loop {
        if let IndexerEvent::ZeroConf {
            session_id,
            new_keys,
            addresses,
            ..
        } = next_event(&mut sub).await
        {
            if session_id != "late" {
                continue;
            }
            assert_eq!(new_keys.len(), 1);
            assert!(new_keys[0].is_zero_conf());
            assert_eq!(addresses, vec![addr(5)]);
            break;
        }
    }

    late.go_online().await.unwrap();
    let balances = late.balances_and_count("w9").unwrap().balances;
    assert_eq!(balances.unconfirmed, 4_500);
    assert_eq!(balances.spendable, 0);
}

// =============================================================================
// QUERIES
// =============================================================================

#[tokio::test]
async fn test_queries_wait_for_go_online() {
    let h = Harness::new();
    let view = h.view("s1");
    view.register_addresses(GroupKind::Wallets, "w1", vec![addr(1)], true, "")
        .unwrap();
    view.registrations_settled().await;

    assert!(matches!(view.balances_and_count("w1"), Err(ViewError::NotReady)));
    assert!(matches!(
        view.ledger_delegate(DelegateTarget::Group(GroupKind::Wallets)),
        Err(ViewError::NotReady)
    ));

    let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Wallet]));
    assert_eq!(view.go_online().await.unwrap(), 0);
    assert!(matches!(
        next_event(&mut sub).await,
        IndexerEvent::Ready { height: 0, .. }
    ));
    assert!(view.balances_and_count("w1").is_ok());
    assert!(matches!(
        view.balances_and_count("nope"),
        Err(ViewError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_balances_follow_zero_conf_spend() {
    let h = Harness::new();
    let view = h.online_view("s1").await;

    let before = view.balances_and_count("w1").unwrap();
    assert_eq!(before.balances.full, 15_000);
    assert_eq!(before.balances.spendable, 15_000);
    assert_eq!(before.tx_count, 3);

    // spend addr(2)'s 7_000, 6_000 back to addr(1)
    let tx = TxBuilder::new()
        .spend(h.funding(1))
        .pay(script(1), 6_000)
        .build();
    h.announce(&tx).await;

    let after = view.balances_and_count("w1").unwrap();
    assert_eq!(after.balances.full, 14_000);
    assert_eq!(after.balances.spendable, 8_000);
    assert_eq!(after.balances.unconfirmed, 6_000);
    assert_eq!(after.tx_count, 4);

    let per_addr = view.addr_balances("w1").unwrap();
    assert_eq!(per_addr[&addr(1)].full, 11_000);
    assert_eq!(per_addr[&addr(2)].full, 3_000);
    assert_eq!(view.spendable_zc_list("w1").unwrap().len(), 1);
}

#[tokio::test]
async fn test_spentness_prefers_mempool() {
    let h = Harness::new();
    let view = h.online_view("s1").await;

    let tx = TxBuilder::new()
        .spend(h.funding(0))
        .pay(script(3), 4_000)
        .build();
    h.announce(&tx).await;

    let unknown = OutPoint::new([9u8; 32], 0);
    let zc_out = OutPoint::new(tx.hash(), 0);
    let states = view
        .outpoint_spentness(&[h.funding(0), h.funding(1), zc_out, unknown])
        .unwrap();
    assert_eq!(
        states[0],
        Spentness::Spent {
            height: UNCONFIRMED_HEIGHT,
            spender: tx.hash(),
        }
    );
    assert_eq!(states[1], Spentness::Unspent);
    assert_eq!(states[2], Spentness::Unspent);
    assert_eq!(states[3], Spentness::Unknown);
}

#[tokio::test]
async fn test_spendable_txouts_cover_value() {
    let h = Harness::new();
    let view = h.online_view("s1").await;

    let one = view.spendable_txouts_for_value("w1", 6_000).unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].value, 7_000);

    let all = view.spendable_txouts_for_value("w1", 14_000).unwrap();
    assert_eq!(all.iter().map(|u| u.value).sum::<u64>(), 15_000);
}

#[tokio::test]
async fn test_spendable_txouts_for_addr_skip_zero_conf_spends() {
    let h = Harness::new();
    let view = h.online_view("s1").await;

    let before = view.spendable_txouts_for_addr("w1", &addr(2)).unwrap();
    assert_eq!(before.iter().map(|u| u.value).collect::<Vec<_>>(), vec![7_000, 3_000]);

    // spend addr(2)'s 7_000, change back to addr(2)
    let tx = TxBuilder::new()
        .spend(h.funding(1))
        .pay(script(2), 6_500)
        .build();
    h.announce(&tx).await;

    let after = view.spendable_txouts_for_addr("w1", &addr(2)).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].tx_hash, h.coinbases[2].hash());
    assert_eq!(after[0].script, script(2));

    assert!(matches!(
        view.spendable_txouts_for_addr("w1", &addr(3)),
        Err(ViewError::NotFound { what: "address", .. })
    ));
    assert!(matches!(
        view.spendable_txouts_for_addr("nope", &addr(2)),
        Err(ViewError::NotFound { what: "wallet", .. })
    ));
}

#[tokio::test]
async fn test_tx_and_header_lookups() {
    let h = Harness::new();
    let view = h.online_view("s1").await;

    let info = view.tx_by_hash(&h.coinbases[0].hash()).unwrap();
    assert_eq!(info.height, 0);
    assert!(matches!(
        view.tx_by_hash(&[7u8; 32]),
        Err(ViewError::NotFound { .. })
    ));

    let header = h.store.top_header().unwrap();
    assert_eq!(view.header_by_height(0).unwrap(), header.to_bytes());
    assert_eq!(view.header_by_hash(&header.hash).unwrap(), header.to_bytes());
    assert!(view.header_by_height(9).is_err());
}

// =============================================================================
// LEDGERS
// =============================================================================

#[tokio::test]
async fn test_group_pages_survive_untouching_scan() {
    let h = Harness::new();
    let view = h.online_view("s1").await;
    let delegate = view
        .ledger_delegate(DelegateTarget::Group(GroupKind::Wallets))
        .unwrap();

    let page = view.history_page(&delegate, 0, false, false).unwrap();
    assert_eq!(page.len(), 3);
    let update_id = view.update_id();

    let touched = view.scan_wallets(&ScanNotification::ZeroConf {
        addresses: vec![addr(8)],
        invalidated: Vec::new(),
    });
    assert!(!touched);
    assert_eq!(view.update_id(), update_id);
    assert_eq!(view.history_page(&delegate, 0, false, false).unwrap(), page);

    assert!(view.scan_wallets(&ScanNotification::Refresh));
    assert!(view.update_id() > update_id);
    assert_eq!(view.history_page(&delegate, 0, false, true).unwrap(), page);
    assert_eq!(view.page_count(&delegate).unwrap(), 1);
    assert!(view.history_page(&delegate, 1, false, false).is_err());
}

#[tokio::test]
async fn test_address_delegate_and_unknown_delegate() {
    let h = Harness::new();
    let view = h.online_view("s1").await;
    let delegate = view
        .ledger_delegate(DelegateTarget::Address(addr(2)))
        .unwrap();
    let page = view.history_page(&delegate, 0, false, false).unwrap();
    assert_eq!(page.len(), 2);
    assert!(page.iter().all(|e| e.value > 0));

    assert!(matches!(
        view.history_page("missing", 0, false, false),
        Err(ViewError::NotFound { .. })
    ));

    view.close();
    assert!(!view.is_ready());
}

#[tokio::test]
async fn test_ledger_filter_and_zero_conf_entries() {
    let h = Harness::new();
    let view = h.online_view("s1").await;
    view.register_addresses(GroupKind::Wallets, "w2", vec![addr(6)], true, "")
        .unwrap();
    view.registrations_settled().await;

    let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Wallet]));
    view.update_wallets_ledger_filter(vec!["w2".into()]).await.unwrap();
    assert!(matches!(
        next_event(&mut sub).await,
        IndexerEvent::Refresh {
            refresh_type: RefreshType::Filter,
            ..
        }
    ));
    let delegate = view
        .ledger_delegate(DelegateTarget::Group(GroupKind::Wallets))
        .unwrap();
    assert!(view.history_page(&delegate, 0, false, false).unwrap().is_empty());
    assert!(view
        .update_wallets_ledger_filter(vec!["nope".into()])
        .await
        .is_err());

    let tx = TxBuilder::new()
        .spend(h.funding(0))
        .pay(script(6), 4_000)
        .build();
    h.announce(&tx).await;
    let key = h.engine.snapshot().key_for_hash(&tx.hash()).unwrap();
    let entries = view.zero_conf_entries(&[key]);
    assert_eq!(entries.len(), 2);
    let by_wallet: std::collections::BTreeMap<_, _> =
        entries.iter().map(|e| (e.id.as_str(), e.value)).collect();
    assert_eq!(by_wallet["w1"], -5_000);
    assert_eq!(by_wallet["w2"], 4_000);

    let selection = view.history_for_wallet_selection(&["w1".into()]).unwrap();
    assert_eq!(selection.len(), 4);
}
