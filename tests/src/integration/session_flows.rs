//! # Session Flows
//!
//! Session lifecycle and scheduling through the full runtime.
//!
//! ## Flows Tested:
//!
//! 1. **Single flight**: bus events and wire commands racing into one
//!    session never run concurrently
//! 2. **Unregister / register**: a connection can start a new session
//! 3. **Shutdown**: the cookie-gated command stops the node

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use bv_03_session::{method, CommandEnvelope, Notification, Response, SessionApi};
    use bv_04_transport::{ShutdownRequest, TransportClient, TransportError};
    use shared_bus::IndexerEvent;
    use shared_types::ports::NodeStatus;
    use tokio::time::timeout;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_across_transport_and_bus() {
        const COMMANDS: usize = 40;
        const EVENTS: usize = 40;

        let node = TestNode::start().await;
        let mut client = node.online_client("w", &[addr(1), addr(2)]).await;
        let session_id = client.session_id().unwrap().to_string();

        let sessions = node.container.sessions.clone();
        let events = tokio::spawn(async move {
            for _ in 0..EVENTS {
                sessions.route(IndexerEvent::NodeStatus(NodeStatus::default()));
                tokio::task::yield_now().await;
            }
        });

        let mut pending = Vec::with_capacity(COMMANDS);
        for i in 0..COMMANDS {
            let env = if i % 2 == 0 {
                CommandEnvelope::new(method::GET_TOP_BLOCK_HEIGHT)
            } else {
                let mut env = CommandEnvelope::new(method::GET_BALANCES_AND_COUNT);
                env.wallet_id = Some("w".into());
                env
            };
            pending.push(client.send(env).await.unwrap());
        }
        events.await.unwrap();

        for msg_id in pending {
            let response = timeout(WAIT, client.response(msg_id))
                .await
                .expect("answered")
                .unwrap();
            assert!(!matches!(response, Response::Error { .. }));
        }
        let mut statuses = 0;
        while statuses < EVENTS {
            notification(&mut client, |n| matches!(n, Notification::NodeStatus(_))).await;
            statuses += 1;
        }

        assert_eq!(node.container.sessions.max_in_flight(&session_id), Some(1));
    }

    #[tokio::test]
    async fn test_unregister_then_register_again() {
        let node = TestNode::start().await;
        let mut client = node.client().await;
        let first = client.session_id().unwrap().to_string();

        let response = client
            .call(CommandEnvelope::new(method::UNREGISTER_BDV))
            .await
            .unwrap();
        assert_eq!(response, Response::Empty);

        let second = client.register(&MAGIC).await.unwrap();
        assert_ne!(first, second);
        assert!(!node.container.sessions.contains(&first));
        assert!(node.container.sessions.contains(&second));

        let height = client
            .call(CommandEnvelope::new(method::GET_TOP_BLOCK_HEIGHT))
            .await
            .unwrap();
        assert_eq!(height, Response::Height(0));
    }

    #[tokio::test]
    async fn test_wrong_magic_gets_no_session() {
        let node = TestNode::start().await;
        let mut client = TransportClient::connect(node.addr).await.unwrap();

        let err = client.register(b"nope").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { .. }));
        assert_eq!(node.container.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_node_command_stops_runtime() {
        let node = TestNode::start().await;
        let mut online = node.online_client("w", &[addr(1)]).await;
        let mut admin = TransportClient::connect(node.addr).await.unwrap();

        let mut env = CommandEnvelope::new(method::SHUTDOWN_NODE);
        env.ids.push(COOKIE.into());
        assert_eq!(admin.call(env).await.unwrap(), Response::Empty);

        let request = timeout(WAIT, node.runtime.shutdown_requested())
            .await
            .expect("shutdown requested");
        assert_eq!(request, Some(ShutdownRequest::Node));

        node.runtime.shutdown().await;
        assert_eq!(node.container.sessions.session_count(), 0);
        let next = timeout(WAIT, online.next_notification()).await.unwrap();
        assert!(next.is_err());
    }
}
