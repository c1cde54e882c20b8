//! # Test Fixtures
//!
//! `TestNode` starts a node runtime on `127.0.0.1:0` with a deterministic
//! genesis block, and drives its chain and inventory through the node feed,
//! the way a node would.
//!
//! | Genesis coinbase | Pays | Value |
//! |------------------|------|-------|
//! | 0 | `addr(1)` | 5_000 |
//! | 1 | `addr(2)` | 7_000 |
//! | 2 | `addr(9)` (outside every wallet) | 20_000 |
//! | 3 | `addr(9)` | 20_000 |

use bv_01_zero_conf::ZeroConfApi;
use bv_02_wallet_view::BalancesAndCount;
use bv_03_session::{method, CommandEnvelope, Notification, Response};
use bv_04_transport::TransportClient;
use node_runtime::container::config::DEFAULT_NETWORK_MAGIC;
use node_runtime::genesis::{GenesisBuilder, GenesisConfig};
use node_runtime::{NodeConfig, NodeContainer, NodeRuntime};
use shared_bus::{EventFilter, EventTopic, IndexerEvent};
use shared_types::entities::{Hash, OutPoint, ScrAddr};
use shared_types::memory::{InMemoryChainStore, MemoryNodeFeed};
use shared_types::ports::ReorgState;
use shared_types::tx::Transaction;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const MAGIC: [u8; 4] = DEFAULT_NETWORK_MAGIC;
pub const COOKIE: &str = "integration-cookie";

/// Upper bound for anything a scenario waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn script(tag: u8) -> Vec<u8> {
    let mut s = vec![0x76, 0xa9, 0x14];
    s.extend_from_slice(&[tag; 20]);
    s.extend_from_slice(&[0x88, 0xac]);
    s
}

pub fn addr(tag: u8) -> ScrAddr {
    ScrAddr::from_script(&script(tag))
}

pub struct TestNode {
    pub runtime: NodeRuntime,
    pub container: Arc<NodeContainer>,
    pub store: Arc<InMemoryChainStore>,
    pub feed: Arc<MemoryNodeFeed>,
    pub addr: SocketAddr,
    pub genesis: Vec<Transaction>,
}

impl TestNode {
    pub async fn start() -> Self {
        let mut config = NodeConfig::default();
        config.network.listen_addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.network.port = 0;
        config.security.cookie = COOKIE.into();
        config.zero_conf.broadcast_timeout = Duration::from_millis(500);

        let store = Arc::new(InMemoryChainStore::new());
        let builder = GenesisBuilder::new(GenesisConfig {
            timestamp: Some(1_000),
            payouts: vec![
                (script(1), 5_000),
                (script(2), 7_000),
                (script(9), 20_000),
                (script(9), 20_000),
            ],
        });
        let genesis = builder.transactions();
        builder.seed(&store).expect("empty store");

        let feed = Arc::new(MemoryNodeFeed::new());
        let runtime = NodeRuntime::new(NodeContainer::new(config, store.clone(), feed.clone()));
        let addr = runtime.start().await.expect("listener bound");
        Self {
            container: runtime.container(),
            runtime,
            store,
            feed,
            addr,
            genesis,
        }
    }

    /// A connected client with a session.
    pub async fn client(&self) -> TransportClient {
        let mut client = TransportClient::connect(self.addr).await.expect("connected");
        client.register(&MAGIC).await.expect("registered");
        client
    }

    /// A client whose wallet `wallet_id` watches `addrs`, online.
    pub async fn online_client(&self, wallet_id: &str, addrs: &[ScrAddr]) -> TransportClient {
        let mut client = self.client().await;
        assert_eq!(register_wallet(&mut client, wallet_id, addrs).await, Response::Empty);
        go_online(&mut client).await;
        client
    }

    pub fn funding(&self, i: usize) -> OutPoint {
        OutPoint::new(self.genesis[i].hash(), 0)
    }

    /// Relay `tx` and announce it on the feed's inventory.
    pub async fn announce(&self, tx: &Transaction) -> Hash {
        let hash = self.feed.announce(tx);
        self.wait_pooled(&hash).await;
        hash
    }

    pub async fn wait_pooled(&self, hash: &Hash) {
        let engine = &self.container.zero_conf;
        timeout(WAIT, async {
            while engine.snapshot().key_for_hash(hash).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tx pooled in time");
    }

    /// Connect `blocks` on top of the chain and announce the new tip.
    pub async fn mine(&self, blocks: Vec<Vec<Transaction>>) {
        let reorg = self.store.extend(blocks).expect("chain not empty");
        self.announce_tip(reorg).await;
    }

    /// Replace the top `depth` blocks with `blocks` and announce the new
    /// tip.
    pub async fn reorg(&self, depth: u32, blocks: Vec<Vec<Transaction>>) {
        let reorg = self.store.reorg(depth, blocks).expect("valid reorg");
        self.announce_tip(reorg).await;
    }

    /// Returns once the runtime published `NewBlock` for the tip.
    async fn announce_tip(&self, reorg: ReorgState) {
        let height = reorg.new_top.height;
        let mut tips = self
            .container
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Chain]));
        self.feed.announce_block(reorg);
        timeout(WAIT, async {
            loop {
                match tips.recv().await {
                    Some(IndexerEvent::NewBlock { height: h, .. }) if h == height => break,
                    Some(_) => continue,
                    None => panic!("bus closed"),
                }
            }
        })
        .await
        .expect("tip announced in time");
    }
}

pub async fn register_wallet(
    client: &mut TransportClient,
    wallet_id: &str,
    addrs: &[ScrAddr],
) -> Response {
    let msg = send_register(client, wallet_id, addrs).await;
    client.response(msg).await.expect("registration answered")
}

/// Send a registration without waiting for it; returns its message id.
pub async fn send_register(
    client: &mut TransportClient,
    wallet_id: &str,
    addrs: &[ScrAddr],
) -> u32 {
    let mut env = CommandEnvelope::new(method::REGISTER_WALLET);
    env.wallet_id = Some(wallet_id.into());
    env.bin_args = addrs.iter().map(|a| a.as_bytes().to_vec()).collect();
    env.flag = Some(true);
    client.send(env).await.expect("sent")
}

/// `GoOnline`, then wait for the `Ready` push.
pub async fn go_online(client: &mut TransportClient) -> u32 {
    let response = client
        .call(CommandEnvelope::new(method::GO_ONLINE))
        .await
        .expect("answered");
    let Response::Height(height) = response else {
        panic!("height expected, got {response:?}");
    };
    notification(client, |n| matches!(n, Notification::Ready { .. })).await;
    height
}

pub async fn balances(client: &mut TransportClient, wallet_id: &str) -> BalancesAndCount {
    let mut env = CommandEnvelope::new(method::GET_BALANCES_AND_COUNT);
    env.wallet_id = Some(wallet_id.into());
    match client.call(env).await.expect("answered") {
        Response::BalancesAndCount(balances) => balances,
        other => panic!("balances expected, got {other:?}"),
    }
}

/// Next notification matching `pred`; others are skipped.
pub async fn notification(
    client: &mut TransportClient,
    pred: impl Fn(&Notification) -> bool,
) -> Notification {
    timeout(WAIT, async {
        loop {
            let next = client.next_notification().await.expect("connection open");
            if pred(&next) {
                return next;
            }
        }
    })
    .await
    .expect("notification in time")
}
