//! # Zero-Conf Flows
//!
//! Mempool activity as clients see it over the wire.
//!
//! ## Flows Tested:
//!
//! 1. **Inventory → ZeroConf → sessions**: an announced tx reaches every
//!    session watching one of its addresses
//! 2. **Registration race**: a tx arriving while a wallet registers is
//!    counted once the wallet is online
//! 3. **Broadcast**: malformed bytes fail fast, valid txs enter the pool
//! 4. **New block / reorg**: mined and invalidated keys reach the clients

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use bv_01_zero_conf::ZeroConfApi;
    use bv_03_session::{method, CommandEnvelope, Notification, Response};
    use shared_types::tx::TxBuilder;

    // =============================================================================
    // NOTIFICATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_overlapping_sessions_are_both_notified() {
        let node = TestNode::start().await;
        let mut a = node.online_client("wa", &[addr(1), addr(2)]).await;
        let mut b = node.online_client("wb", &[addr(1), addr(3)]).await;

        // outside funds to the shared address
        let tx = TxBuilder::new()
            .spend(node.funding(2))
            .pay(script(1), 2_500)
            .pay(script(9), 17_000)
            .build();
        node.announce(&tx).await;

        for (client, wallet) in [(&mut a, "wa"), (&mut b, "wb")] {
            let Notification::ZeroConf { entries, invalidated } =
                notification(client, |n| matches!(n, Notification::ZeroConf { .. })).await
            else {
                unreachable!();
            };
            assert!(invalidated.is_empty());
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].id, wallet);
            assert_eq!(entries[0].value, 2_500);
            assert_eq!(entries[0].tx_hash, tx.hash());
        }

        assert_eq!(balances(&mut a, "wa").await.balances.unconfirmed, 2_500);
        assert_eq!(balances(&mut b, "wb").await.balances.unconfirmed, 2_500);
    }

    #[tokio::test]
    async fn test_zero_conf_during_registration_is_not_lost() {
        let node = TestNode::start().await;
        // someone else is already watching, so inventory is processed
        let _observer = node.online_client("wo", &[addr(8)]).await;

        let mut client = node.client().await;
        let reg = send_register(&mut client, "w", &[addr(1), addr(2)]).await;
        let tx = TxBuilder::new()
            .spend(node.funding(2))
            .pay(script(1), 4_000)
            .build();
        node.announce(&tx).await;

        assert_eq!(client.response(reg).await.unwrap(), Response::Empty);
        go_online(&mut client).await;

        let summary = balances(&mut client, "w").await;
        assert_eq!(summary.balances.unconfirmed, 4_000);
        assert_eq!(summary.balances.spendable, 12_000);
        assert_eq!(summary.tx_count, 3);
    }

    // =============================================================================
    // BROADCAST
    // =============================================================================

    #[tokio::test]
    async fn test_malformed_broadcast_fails_fast() {
        let node = TestNode::start().await;
        let mut client = node.online_client("w", &[addr(1), addr(2)]).await;

        let mut env = CommandEnvelope::new(method::BROADCAST_ZC);
        env.bin_args.push(vec![0x01, 0x00, 0x00]);
        let response = tokio::time::timeout(WAIT, client.call(env))
            .await
            .expect("answered within the timeout")
            .unwrap();
        assert!(matches!(response, Response::Error { .. }));

        assert!(node.container.zero_conf.snapshot().is_empty());
        let mut env = CommandEnvelope::new(method::GET_HISTORY_FOR_WALLET_SELECTION);
        env.ids.push("w".into());
        let Response::LedgerEntries(history) = client.call(env).await.unwrap() else {
            panic!("history expected");
        };
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.block_height == 0));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_watching_session() {
        let node = TestNode::start().await;
        let mut sender = node.online_client("ws", &[addr(2)]).await;
        let mut payee = node.online_client("wp", &[addr(4)]).await;

        let tx = TxBuilder::new()
            .spend(node.funding(1))
            .pay(script(4), 6_500)
            .build();
        let mut env = CommandEnvelope::new(method::BROADCAST_ZC);
        env.bin_args.push(tx.serialize());
        assert_eq!(sender.call(env).await.unwrap(), Response::Empty);

        let Notification::ZeroConf { entries, .. } =
            notification(&mut payee, |n| matches!(n, Notification::ZeroConf { .. })).await
        else {
            unreachable!();
        };
        assert_eq!(entries[0].value, 6_500);
        assert!(node.feed.rpc_broadcasts().is_empty());

        // the sender's spent output is in the same zero-conf push
        notification(&mut sender, |n| matches!(n, Notification::ZeroConf { .. })).await;
        let summary = balances(&mut sender, "ws").await;
        assert_eq!(summary.balances.full, 0);
    }

    #[tokio::test]
    async fn test_spendable_list_for_addr_drops_zero_conf_spend() {
        let node = TestNode::start().await;
        let mut client = node.online_client("w", &[addr(1), addr(2)]).await;

        let tx = TxBuilder::new()
            .spend(node.funding(1))
            .pay(script(9), 6_500)
            .build();
        node.announce(&tx).await;
        notification(&mut client, |n| matches!(n, Notification::ZeroConf { .. })).await;

        let spendable = |tag: u8| {
            let mut env = CommandEnvelope::new(method::GET_SPENDABLE_TX_OUT_LIST_FOR_ADDR);
            env.wallet_id = Some("w".into());
            env.bin_args.push(addr(tag).as_bytes().to_vec());
            env
        };
        let spent = client.call(spendable(2)).await.unwrap();
        assert_eq!(spent, Response::Utxos(Vec::new()));

        let Response::Utxos(untouched) = client.call(spendable(1)).await.unwrap() else {
            panic!("utxos expected");
        };
        assert_eq!(untouched.len(), 1);
        assert_eq!(untouched[0].value, 5_000);
        assert_eq!(untouched[0].tx_hash, node.funding(0).hash);
    }

    // =============================================================================
    // NEW BLOCKS
    // =============================================================================

    #[tokio::test]
    async fn test_mined_zero_conf_becomes_confirmed() {
        let node = TestNode::start().await;
        let mut client = node.online_client("w", &[addr(1)]).await;

        let tx = TxBuilder::new()
            .spend(node.funding(2))
            .pay(script(1), 3_000)
            .build();
        node.announce(&tx).await;
        notification(&mut client, |n| matches!(n, Notification::ZeroConf { .. })).await;

        let coinbase = TxBuilder::new().coinbase(100).pay(script(9), 5_000).build();
        node.mine(vec![vec![coinbase, tx]]).await;

        let block = notification(&mut client, |n| matches!(n, Notification::NewBlock { .. })).await;
        assert_eq!(
            block,
            Notification::NewBlock {
                height: 1,
                branch_height: None,
                invalidated: Vec::new(),
            }
        );
        let summary = balances(&mut client, "w").await;
        assert_eq!(summary.balances.unconfirmed, 0);
        assert_eq!(summary.balances.spendable, 8_000);
    }

    #[tokio::test]
    async fn test_reorg_invalidates_orphaned_spend() {
        let node = TestNode::start().await;
        let mut client = node.online_client("w", &[addr(1)]).await;

        // block 1 funds addr(9); a zero-conf tx moves that output to addr(1)
        let funding = TxBuilder::new().coinbase(100).pay(script(9), 9_000).build();
        node.mine(vec![vec![funding.clone()]]).await;
        notification(&mut client, |n| matches!(n, Notification::NewBlock { .. })).await;

        let orphan = TxBuilder::new()
            .spend(shared_types::entities::OutPoint::new(funding.hash(), 0))
            .pay(script(1), 8_000)
            .build();
        node.announce(&orphan).await;
        notification(&mut client, |n| matches!(n, Notification::ZeroConf { .. })).await;
        assert_eq!(balances(&mut client, "w").await.balances.unconfirmed, 8_000);

        // block 1 is replaced by a block without the funding coinbase
        let other = TxBuilder::new().coinbase(101).pay(script(9), 9_000).build();
        node.reorg(1, vec![vec![other]]).await;

        let Notification::NewBlock {
            height,
            branch_height,
            invalidated,
        } = notification(&mut client, |n| matches!(n, Notification::NewBlock { .. })).await
        else {
            unreachable!();
        };
        assert_eq!(height, 1);
        assert_eq!(branch_height, Some(0));
        assert_eq!(invalidated.len(), 1);

        assert!(node.container.zero_conf.snapshot().is_empty());
        let summary = balances(&mut client, "w").await;
        assert_eq!(summary.balances.unconfirmed, 0);
        assert_eq!(summary.balances.full, 5_000);
    }
}
