use super::*;
use crate::domain::{
    encode_envelope, fragment, method, CommandEnvelope, Notification, Packet, Reassembler,
    Response, ServerMessage, SessionConfig, CALLBACK_ID,
};
use crate::ports::{MockSink, SessionApi};
use bv_01_zero_conf::{ZeroConfApi, ZeroConfConfig, ZeroConfEngine};
use bv_02_wallet_view::{AddressFilter, ViewContext};
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, IndexerEvent, RefreshType};
use shared_types::entities::{OutPoint, ScrAddr};
use shared_types::errors::ErrorKind;
use shared_types::memory::{InMemoryChainStore, MemoryNodeFeed};
use shared_types::ports::NodeStatus;
use shared_types::tx::{Transaction, TxBuilder};
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
    feed: Arc<MemoryNodeFeed>,
    bus: Arc<InMemoryEventBus>,
    engine: ZeroConfEngine,
    manager: SessionManager,
    /// Genesis block: 5_000 to addr(1), 7_000 to addr(2), 3_000 to addr(2).
    coinbases: Vec<Transaction>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    fn with_config(config: SessionConfig) -> Self {
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
            store,
            feed: feed.clone(),
            zero_conf: Arc::new(engine.clone()),
            publisher: bus.clone(),
            filter,
        };
        let manager = SessionManager::new(config, ctx);
        manager.start_dispatcher(bus.subscribe(EventFilter::all()));
        Self {
            feed,
            bus,
            engine,
            manager,
            coinbases,
        }
    }

    fn connect(&self) -> Client {
        let sink = Arc::new(MockSink::new());
        let id = self.manager.open(sink.clone());
        Client {
            id,
            sink,
            manager: self.manager.clone(),
            next_msg: 0,
        }
    }

    /// A client whose wallet w1 watches addr(1) and addr(2), online.
    async fn online_client(&self) -> Client {
        let mut client = self.connect();
        let reg = client.register("w1", &[addr(1), addr(2)], "");
        let online = client.send(CommandEnvelope::new(method::GO_ONLINE));
        assert_eq!(client.response(reg).await, Response::Empty);
        assert_eq!(client.response(online).await, Response::Height(0));
        client
            .notification(|n| matches!(n, Notification::Ready { .. }))
            .await;
        client
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

/// Client side of one connection, talking straight to the manager.
struct Client {
    id: String,
    sink: Arc<MockSink>,
    manager: SessionManager,
    next_msg: u32,
}

fn decode_message(packets: &[Vec<u8>]) -> (u32, ServerMessage) {
    let mut reassembler = Reassembler::default();
    let mut whole = None;
    for raw in packets {
        whole = reassembler.push(Packet::decode(raw).unwrap()).unwrap();
    }
    let (msg_id, bytes) = whole.expect("complete message");
    (msg_id, ServerMessage::decode(&bytes).unwrap())
}

impl Client {
    /// Send `envelope` under this session; returns its message id.
    fn send(&mut self, envelope: CommandEnvelope) -> u32 {
        let envelope = envelope.with_session(self.id.clone());
        self.send_raw(&encode_envelope(&envelope).unwrap())
    }

    fn send_raw(&mut self, message: &[u8]) -> u32 {
        self.next_msg += 1;
        let packet_size = self.manager.config().packet_size;
        for packet in fragment(self.next_msg, message, packet_size).unwrap() {
            self.manager.deliver(&self.id, packet.encode()).unwrap();
        }
        self.next_msg
    }

    fn register(&mut self, wallet_id: &str, addrs: &[ScrAddr], registration_id: &str) -> u32 {
        let mut env = CommandEnvelope::new(method::REGISTER_WALLET);
        env.wallet_id = Some(wallet_id.into());
        env.bin_args = addrs.iter().map(|a| a.as_bytes().to_vec()).collect();
        env.flag = Some(true);
        env.registration_id = Some(registration_id.into());
        self.send(env)
    }

    fn messages(&self) -> Vec<(u32, ServerMessage)> {
        self.sink
            .messages()
            .iter()
            .map(|packets| decode_message(packets))
            .collect()
    }

    async fn wait_for_message(&self, pred: impl Fn(u32, &ServerMessage) -> bool) -> ServerMessage {
        timeout(Duration::from_secs(3), async {
            loop {
                let seen = self.sink.len();
                if let Some((_, message)) =
                    self.messages().into_iter().find(|(id, m)| pred(*id, m))
                {
                    return message;
                }
                self.sink.wait_for(seen + 1).await;
            }
        })
        .await
        .expect("message in time")
    }

    async fn response(&self, msg_id: u32) -> Response {
        match self.wait_for_message(|id, _| id == msg_id).await {
            ServerMessage::Response(response) => response,
            other => panic!("response expected, got {other:?}"),
        }
    }

    async fn notification(&self, pred: impl Fn(&Notification) -> bool) -> Notification {
        let message = self
            .wait_for_message(|id, m| {
                id == CALLBACK_ID && matches!(m, ServerMessage::Notification(n) if pred(n))
            })
            .await;
        match message {
            ServerMessage::Notification(notification) => notification,
            other => panic!("notification expected, got {other:?}"),
        }
    }

    async fn balances(&mut self, wallet_id: &str) -> bv_02_wallet_view::BalancesAndCount {
        let mut env = CommandEnvelope::new(method::GET_BALANCES_AND_COUNT);
        env.wallet_id = Some(wallet_id.into());
        let msg = self.send(env);
        match self.response(msg).await {
            Response::BalancesAndCount(balances) => balances,
            other => panic!("balances expected, got {other:?}"),
        }
    }
}

fn error_code(response: &Response) -> i32 {
    match response {
        Response::Error { code, .. } => *code,
        other => panic!("error expected, got {other:?}"),
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::test]
async fn test_go_online_notifies_and_answers() {
    let h = Harness::new();
    let mut client = h.connect();
    let reg = client.register("w1", &[addr(1), addr(2)], "reg-1");
    assert_eq!(client.response(reg).await, Response::Empty);

    let refresh = client
        .notification(|n| matches!(n, Notification::Refresh { .. }))
        .await;
    assert_eq!(
        refresh,
        Notification::Refresh {
            refresh_type: RefreshType::Registration,
            ids: vec!["reg-1".to_string()],
        }
    );

    let online = client.send(CommandEnvelope::new(method::GO_ONLINE));
    assert_eq!(client.response(online).await, Response::Height(0));
    assert_eq!(
        client
            .notification(|n| matches!(n, Notification::Ready { .. }))
            .await,
        Notification::Ready { height: 0 }
    );

    let summary = client.balances("w1").await;
    assert_eq!(summary.balances.full, 15_000);
    assert_eq!(summary.tx_count, 3);
}

#[tokio::test]
async fn test_commands_queue_behind_registration() {
    let h = Harness::new();
    let mut client = h.connect();

    // sent back to back: GoOnline and the balance query wait for the batch
    client.register("w1", &[addr(1), addr(2)], "");
    let online = client.send(CommandEnvelope::new(method::GO_ONLINE));
    let summary = client.balances("w1").await;

    assert_eq!(client.response(online).await, Response::Height(0));
    assert_eq!(summary.balances.full, 15_000);
}

#[tokio::test]
async fn test_handler_errors_become_responses() {
    let h = Harness::new();
    let mut client = h.connect();

    let msg = client.send(CommandEnvelope::new(64));
    assert_eq!(error_code(&client.response(msg).await), ErrorKind::Request.code());

    let msg = client.send(CommandEnvelope::new(method::GET_BALANCES_AND_COUNT));
    assert_eq!(error_code(&client.response(msg).await), ErrorKind::Request.code());

    let mut env = CommandEnvelope::new(method::GET_BALANCES_AND_COUNT);
    env.wallet_id = Some("w1".into());
    let msg = client.send(env);
    assert_eq!(error_code(&client.response(msg).await), ErrorKind::NotReady.code());

    let msg = client.send_raw(&[0xFF, 0xFF, 0xFF]);
    assert_eq!(error_code(&client.response(msg).await), ErrorKind::Protocol.code());

    let foreign = encode_envelope(&CommandEnvelope::new(method::GO_ONLINE).with_session("other"))
        .unwrap();
    let msg = client.send_raw(&foreign);
    assert_eq!(error_code(&client.response(msg).await), ErrorKind::Request.code());

    // the session survives every failure
    let msg = client.send(CommandEnvelope::new(method::GET_TOP_BLOCK_HEIGHT));
    assert_eq!(client.response(msg).await, Response::Height(0));
}

#[tokio::test]
async fn test_malformed_broadcast_fails_without_history() {
    let h = Harness::new();
    let mut client = h.online_client().await;

    let mut env = CommandEnvelope::new(method::BROADCAST_ZC);
    env.bin_args.push(vec![1, 2, 3]);
    let msg = client.send(env);
    assert!(matches!(client.response(msg).await, Response::Error { .. }));
    assert_eq!(h.engine.snapshot().len(), 0);
    assert_eq!(client.balances("w1").await.tx_count, 3);
}

#[tokio::test]
async fn test_large_messages_are_fragmented() {
    let h = Harness::with_config(SessionConfig {
        packet_size: 64,
        ..SessionConfig::default()
    });
    let mut client = h.connect();

    // the registration itself travels in several fragments
    let reg = client.register("w1", &[addr(1), addr(2)], "reg-fragmented");
    assert_eq!(client.response(reg).await, Response::Empty);

    let mut env = CommandEnvelope::new(method::GET_HEADER_BY_HEIGHT);
    env.height = Some(0);
    let msg = client.send(env);
    let Response::Binary(header) = client.response(msg).await else {
        panic!("header expected");
    };
    assert_eq!(header.len(), 77);

    let packets = client
        .sink
        .messages()
        .into_iter()
        .find(|packets| decode_message(packets).0 == msg)
        .unwrap();
    assert!(packets.len() > 1);
    assert!(packets.iter().all(|p| p.len() <= 64));
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[tokio::test]
async fn test_zero_conf_notification_carries_entries() {
    let h = Harness::new();
    let mut client = h.online_client().await;

    let tx = TxBuilder::new()
        .spend(h.funding(0))
        .pay(script(3), 4_000)
        .build();
    h.announce(&tx).await;

    let Notification::ZeroConf { entries, .. } = client
        .notification(|n| matches!(n, Notification::ZeroConf { .. }))
        .await
    else {
        unreachable!();
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "w1");
    assert_eq!(entries[0].value, -5_000);
    assert_eq!(entries[0].tx_hash, tx.hash());

    let summary = client.balances("w1").await;
    assert_eq!(summary.balances.full, 10_000);
}

#[tokio::test]
async fn test_routing_targets_one_or_all() {
    let h = Harness::new();
    let a = h.connect();
    let b = h.connect();

    let reached = h.manager.route(IndexerEvent::NodeStatus(NodeStatus::default()));
    assert_eq!(reached, 2);
    for client in [&a, &b] {
        client
            .notification(|n| matches!(n, Notification::NodeStatus(_)))
            .await;
    }

    let reached = h.manager.route(IndexerEvent::Error {
        session_id: a.id.clone(),
        message: "rejected".into(),
        code: -30_001,
        tx_hash: None,
    });
    assert_eq!(reached, 1);
    a.notification(|n| matches!(n, Notification::Error { .. }))
        .await;
    // b only ever saw the status push
    assert_eq!(b.sink.len(), 1);

    let reached = h.manager.route(IndexerEvent::Ready {
        session_id: "gone".into(),
        height: 0,
    });
    assert_eq!(reached, 0);
}

#[tokio::test]
async fn test_registration_acks_survive_a_burst() {
    const ACKS: usize = 1_100;
    let h = Harness::new();
    assert!(ACKS > h.bus.capacity());
    let client = h.connect();

    for i in 0..ACKS {
        h.bus
            .publish(IndexerEvent::Refresh {
                session_id: client.id.clone(),
                refresh_type: RefreshType::Registration,
                ids: vec![format!("reg-{i}")],
            })
            .await;
    }

    timeout(Duration::from_secs(5), client.sink.wait_for(ACKS))
        .await
        .expect("every ack delivered");
    let acked: Vec<String> = client
        .messages()
        .into_iter()
        .filter_map(|(_, m)| match m {
            ServerMessage::Notification(Notification::Refresh { mut ids, .. }) => ids.pop(),
            _ => None,
        })
        .collect();
    assert_eq!(acked.len(), ACKS);
    assert_eq!(acked.last().map(String::as_str), Some("reg-1099"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_under_concurrent_delivery() {
    const COMMANDS: usize = 50;
    const EVENTS: usize = 50;

    let h = Harness::new();
    let client = h.online_client().await;
    let baseline = client.sink.len();
    let session_id = client.id.clone();

    let manager = h.manager.clone();
    let events = tokio::spawn(async move {
        for _ in 0..EVENTS {
            manager.route(IndexerEvent::NodeStatus(NodeStatus::default()));
            tokio::task::yield_now().await;
        }
    });

    let manager = h.manager.clone();
    let id = session_id.clone();
    let commands = tokio::spawn(async move {
        let bytes = encode_envelope(
            &CommandEnvelope::new(method::GET_TOP_BLOCK_HEIGHT).with_session(id.clone()),
        )
        .unwrap();
        for msg_id in 0..COMMANDS as u32 {
            let packet = Packet::Single {
                msg_id: 1_000 + msg_id,
                data: bytes.clone(),
            };
            manager.deliver(&id, packet.encode()).unwrap();
            tokio::task::yield_now().await;
        }
    });

    events.await.unwrap();
    commands.await.unwrap();
    timeout(
        Duration::from_secs(5),
        client.sink.wait_for(baseline + COMMANDS + EVENTS),
    )
    .await
    .expect("all messages written");

    assert_eq!(h.manager.max_in_flight(&session_id), Some(1));
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_unregister_ends_session() {
    let h = Harness::new();
    let mut client = h.connect();
    assert_eq!(h.manager.session_count(), 1);

    let msg = client.send(CommandEnvelope::new(method::UNREGISTER_BDV));
    assert_eq!(client.response(msg).await, Response::Empty);

    timeout(Duration::from_secs(2), async {
        while h.manager.contains(&client.id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session removed");
    assert!(h.manager.deliver(&client.id, vec![0]).is_err());
}

#[tokio::test]
async fn test_disconnect_discards_responses() {
    let h = Harness::new();
    let mut client = h.online_client().await;
    let written = client.sink.len();

    client.sink.close();
    client.send(CommandEnvelope::new(method::GET_TOP_BLOCK_HEIGHT));
    h.manager.close(&client.id);

    assert_eq!(h.manager.session_count(), 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.sink.len(), written);

    // closing twice is harmless
    h.manager.close(&client.id);
}
