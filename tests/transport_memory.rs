// tests/transport_memory.rs

use bytes::Bytes;
use tokio::time::{timeout, Duration};

use topic_rpc::{
    // ---
    create_memory_transport,
    Message,
    RpcConfig,
    Topic,
    TopicFilter,
};

#[tokio::test]
async fn memory_subscribe_then_publish_delivers() {
    // ---
    // Arrange
    // ---
    let config = RpcConfig::memory("mstpd");

    let transport = create_memory_transport(&config)
        .await
        .expect("failed to create memory transport");

    let topic = Topic::from("test.topic");

    let mut sub = transport
        .subscribe(TopicFilter::from("test.topic"))
        .await
        .expect("subscribe failed");

    let payload = Bytes::from_static(b"hello");

    let msg = Message::new(topic.clone(), payload.clone());

    // ---
    // Act
    // ---
    transport.publish(msg).await.expect("publish failed");

    // ---
    // Assert
    // ---
    let received = timeout(Duration::from_millis(100), sub.inbox.recv())
        .await
        .expect("timed out waiting for message")
        .expect("subscription channel closed unexpectedly");

    assert_eq!(received.payload, payload);
    assert_eq!(received.topic, topic);
}

#[tokio::test]
async fn memory_wildcard_subscription_matches_any_id_segment() {
    // ---
    let config = RpcConfig::memory("mwsm");
    let transport = create_memory_transport(&config).await.unwrap();

    let mut sub = transport
        .subscribe(TopicFilter::from("response/+"))
        .await
        .unwrap();

    // Matches: any single trailing level.
    for id in ["1", "42", "9000"] {
        let msg = Message::new(
            Topic::from(format!("response/{id}")),
            Bytes::from_static(b"body"),
        );
        transport.publish(msg).await.unwrap();
    }

    for expected in ["response/1", "response/42", "response/9000"] {
        let received = timeout(Duration::from_millis(100), sub.inbox.recv())
            .await
            .expect("timed out waiting for message")
            .expect("subscription channel closed unexpectedly");
        assert_eq!(received.topic.as_str(), expected);
    }

    // Does not match: different root, deeper topics, missing level.
    for topic in ["request/1", "response/1/extra", "response"] {
        let msg = Message::new(Topic::from(topic), Bytes::from_static(b"body"));
        transport.publish(msg).await.unwrap();
    }

    let nothing = timeout(Duration::from_millis(100), sub.inbox.recv()).await;
    assert!(nothing.is_err(), "unexpected delivery: {nothing:?}");
}

#[tokio::test]
async fn memory_fans_out_to_all_matching_subscribers() {
    // ---
    let config = RpcConfig::memory("mfo");
    let transport = create_memory_transport(&config).await.unwrap();

    let mut wildcard = transport
        .subscribe(TopicFilter::from("response/+"))
        .await
        .unwrap();
    let mut exact = transport
        .subscribe(TopicFilter::from("response/7"))
        .await
        .unwrap();

    let msg = Message::new(Topic::from("response/7"), Bytes::from_static(b"body"));
    transport.publish(msg).await.unwrap();

    for sub in [&mut wildcard, &mut exact] {
        let received = timeout(Duration::from_millis(100), sub.inbox.recv())
            .await
            .expect("timed out waiting for message")
            .expect("subscription channel closed unexpectedly");
        assert_eq!(received.topic.as_str(), "response/7");
    }
}

#[tokio::test]
async fn memory_close_drops_subscriptions() {
    // ---
    let config = RpcConfig::memory("mcd");
    let transport = create_memory_transport(&config).await.unwrap();

    let mut sub = transport
        .subscribe(TopicFilter::from("response/+"))
        .await
        .unwrap();

    transport.close().await.unwrap();

    // Senders are gone; the inbox closes rather than hanging.
    let received = timeout(Duration::from_millis(100), sub.inbox.recv())
        .await
        .expect("timed out waiting for channel close");
    assert!(received.is_none());
}
