use std::collections::HashMap;
use std::time::Duration;

use kconduit::cluster::types::StartOffset;
use kconduit::cluster::ClusterDriver;
use kconduit::config::ConsumerConfig;
use kconduit::consumer::{event_channel, ConsumerEvent, MultiPartitionConsumer};
use kconduit::error::KconduitError;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
mod helpers;
use helpers::{create_topic, produce_keyed, produce_n, setup_cluster};

async fn recv_messages(rx: &mut mpsc::Receiver<ConsumerEvent>, count: usize) -> Vec<ConsumerEvent> {
    let mut events = Vec::with_capacity(count);
    while events.len() < count {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("channel closed early");
        events.push(event);
    }
    events
}

async fn wait_until_open(cluster: &kconduit::cluster::MemoryCluster, expected: usize) {
    for _ in 0..200 {
        if cluster.cursor_stats().open_now() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cursors never reached {}", expected);
}

mod features {
    use super::*;

    #[tokio::test]
    async fn test_consume_oldest_keeps_partition_order() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 3).await;
        produce_n(&cluster, &topic, 30).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Oldest, tx);

        let events = recv_messages(&mut rx, 30).await;
        handle.stop().await.unwrap();

        let mut last_offset: HashMap<i32, i64> = HashMap::new();
        for event in events {
            let ConsumerEvent::Message(msg) = event else { panic!("unexpected error event") };
            if let Some(prev) = last_offset.insert(msg.partition, msg.offset) {
                assert_eq!(msg.offset, prev + 1, "Offsets must be contiguous within a partition");
            }
        }
        assert_eq!(last_offset.len(), 3);
        assert!(last_offset.values().all(|&o| o == 9));
    }

    #[tokio::test]
    async fn test_cancel_before_any_message_releases_every_cursor() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 4).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, _rx) = event_channel(&ConsumerConfig::default());
        let token = CancellationToken::new();

        let task = {
            let consumer = consumer.clone();
            let topic = topic.clone();
            let token = token.clone();
            tokio::spawn(async move { consumer.consume(&topic, StartOffset::Newest, tx, token).await })
        };

        wait_until_open(&cluster, 4).await;
        token.cancel();

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap().unwrap();

        let stats = cluster.cursor_stats();
        assert_eq!(stats.opened(), 4);
        assert_eq!(stats.closed(), 4);
    }

    #[tokio::test]
    async fn test_open_failure_tears_down_opened_partitions() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 4).await;
        cluster.fail_cursor_open(&topic, 2);

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());

        let err = consumer
            .consume(&topic, StartOffset::Oldest, tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to consume partition 2"));
        let stats = cluster.cursor_stats();
        assert_eq!(stats.opened(), 2);
        assert_eq!(stats.closed(), 2);
        assert!(rx.recv().await.is_none(), "No task should still hold the sender");
    }

    #[tokio::test]
    async fn test_unknown_topic_fails_at_start() {
        let cluster = setup_cluster();
        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, _rx) = event_channel(&ConsumerConfig::default());

        let err = consumer
            .consume("missing", StartOffset::Oldest, tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, KconduitError::TopicNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_reported() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 2).await;
        cluster.set_unavailable(true);

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, _rx) = event_channel(&ConsumerConfig::default());
        let err = consumer
            .consume(&topic, StartOffset::Oldest, tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, KconduitError::PartitionEnumeration { .. }));
    }

    #[tokio::test]
    async fn test_newest_skips_history() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 2).await;
        produce_n(&cluster, &topic, 6).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Newest, tx);
        wait_until_open(&cluster, 2).await;

        let (partition, offset) = produce_keyed(&cluster, &topic, "user-7", "fresh").await;

        let events = recv_messages(&mut rx, 1).await;
        handle.stop().await.unwrap();

        let ConsumerEvent::Message(msg) = &events[0] else { panic!("expected a message") };
        assert_eq!((msg.partition, msg.offset), (partition, offset));
        assert_eq!(offset, 3);
        assert_eq!(msg.value_preview(), "fresh");
        assert_eq!(msg.headers.get("trace").map(String::as_str), Some("t-1"));
    }

    #[tokio::test]
    async fn test_specific_offset_applies_to_every_partition() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 2).await;
        produce_n(&cluster, &topic, 10).await; // 5 per partition

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Specific(3), tx);

        let events = recv_messages(&mut rx, 4).await;
        handle.stop().await.unwrap();

        let mut seen: Vec<(i32, i64)> = events
            .into_iter()
            .map(|e| match e {
                ConsumerEvent::Message(m) => (m.partition, m.offset),
                ConsumerEvent::Error { .. } => panic!("unexpected error event"),
            })
            .collect();
        seen.sort();
        assert_eq!(seen, vec![(0, 3), (0, 4), (1, 3), (1, 4)]);
    }

    #[tokio::test]
    async fn test_partition_errors_arrive_in_band() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 1).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Oldest, tx);
        wait_until_open(&cluster, 1).await;

        cluster.inject_partition_error(&topic, 0, "leader not available");
        produce_n(&cluster, &topic, 1).await;

        let events = recv_messages(&mut rx, 2).await;
        handle.stop().await.unwrap();

        assert!(matches!(
            &events[0],
            ConsumerEvent::Error { partition: 0, error: KconduitError::Rpc(reason), .. } if reason == "leader not available"
        ));
        assert!(matches!(&events[1], ConsumerEvent::Message(m) if m.offset == 0));
    }

    #[tokio::test]
    async fn test_deleted_topic_ends_consumption() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 3).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Oldest, tx);
        wait_until_open(&cluster, 3).await;

        cluster.delete_topic(&topic).await.unwrap();

        timeout(Duration::from_secs(2), handle.join()).await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(cluster.cursor_stats().closed(), 3);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_partition_tasks() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 2).await;
        produce_n(&cluster, &topic, 4).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = consumer.spawn(&topic, StartOffset::Oldest, tx);
        timeout(Duration::from_secs(2), handle.join()).await.unwrap().unwrap();

        assert_eq!(cluster.cursor_stats().open_now(), 0);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_releases_idle_partitions() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 3).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, rx) = event_channel(&ConsumerConfig::default());
        let handle = consumer.spawn(&topic, StartOffset::Newest, tx);
        wait_until_open(&cluster, 3).await;

        drop(handle);
        drop(rx);

        wait_until_open(&cluster, 0).await;
        assert_eq!(cluster.cursor_stats().closed(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_open_opens_nothing() {
        let cluster = setup_cluster();
        let topic = create_topic(&cluster, 8).await;

        let consumer = MultiPartitionConsumer::new(cluster.clone());
        let (tx, mut rx) = event_channel(&ConsumerConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        consumer.consume(&topic, StartOffset::Oldest, tx, token).await.unwrap();

        assert_eq!(cluster.cursor_stats().opened(), 0);
        assert!(rx.recv().await.is_none());
    }
}
