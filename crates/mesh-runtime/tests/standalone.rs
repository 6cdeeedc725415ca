//! 内置进程内连接器经由组管理器的端到端行为：投递、请求-应答、超时与关闭。

use std::{sync::Arc, time::Duration};

use mesh_protocol::{
    Envelope, ProtocolFamily, SimpleMessage,
    translate::{to_batch_message, to_simple_message},
};
use mesh_runtime::{
    ConnectorCatalog, ConnectorFailureKind, GroupConfig, GroupManager, GroupRegistry, MeshConfig,
    MeshError, SendContext, StandaloneBroker, StandaloneConnector,
};

fn catalog(broker: &Arc<StandaloneBroker>) -> ConnectorCatalog {
    let catalog = ConnectorCatalog::new();
    catalog.register_factory("standalone", StandaloneConnector::factory(Arc::clone(broker)));
    catalog
}

async fn started(broker: &Arc<StandaloneBroker>, group: &str) -> Arc<GroupManager> {
    let mesh = MeshConfig::new("standalone-test");
    let manager = Arc::new(GroupManager::new(group, Arc::new(catalog(broker))));
    manager
        .initialize(&mesh, &GroupConfig::producer(group))
        .await
        .expect("init");
    manager.start().await.expect("start");
    manager
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_reply_round_trip() {
    let broker = Arc::new(StandaloneBroker::new());
    let requester = started(&broker, "requester").await;
    let responder = started(&broker, "responder").await;
    let mut inbox = broker.subscribe("rpc");

    let echo = tokio::spawn(async move {
        let request = inbox.recv().await.expect("request");
        let response = Envelope::new("rpc-replies", format!("pong:{}", request.content_str().unwrap_or_default()))
            .with_sequence_number(request.sequence_number.clone());
        responder
            .reply(SendContext::new(response))
            .await
            .expect("reply");
    });

    let request = Envelope::new("rpc", "ping").with_sequence_number("req-1");
    let response = requester
        .request_reply(SendContext::new(request), Some(Duration::from_secs(2)))
        .await
        .expect("reply arrives");
    echo.await.expect("responder");

    assert_eq!(response.content_str(), Some("pong:ping"));
    assert_eq!(response.sequence_number, "req-1");
    assert_eq!(broker.outstanding_requests(), 0);
    assert!(broker.retained("rpc-replies").is_empty());
}

#[tokio::test]
async fn request_reply_times_out_without_responder() {
    let broker = Arc::new(StandaloneBroker::new());
    let manager = started(&broker, "lonely").await;
    let timeout = Duration::from_millis(30);

    let err = manager
        .request_reply(SendContext::new(Envelope::new("rpc", "ping")), Some(timeout))
        .await
        .expect_err("timeout");
    assert_eq!(err, MeshError::Timeout { timeout });
    assert_eq!(broker.outstanding_requests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_fails_outstanding_requests() {
    let broker = Arc::new(StandaloneBroker::new());
    let manager = started(&broker, "closing").await;

    let waiting = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .request_reply(
                    SendContext::new(Envelope::new("rpc", "ping")),
                    Some(Duration::from_secs(5)),
                )
                .await
        })
    };
    while broker.outstanding_requests() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    manager.shutdown().await.expect("shutdown");
    let err = waiting.await.expect("join").expect_err("delivery error");
    assert!(matches!(
        err,
        MeshError::ConnectorRuntime { kind: ConnectorFailureKind::Unclassified, .. }
    ));
}

#[tokio::test]
async fn concurrent_requests_do_not_block_each_other() {
    let broker = Arc::new(StandaloneBroker::new());
    let manager = started(&broker, "busy").await;

    // 第一个请求无人应答，等待期间第二次投递必须立即完成。
    let slow = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .request_reply(
                    SendContext::new(Envelope::new("rpc", "slow")),
                    Some(Duration::from_millis(200)),
                )
                .await
        })
    };
    let receipt = tokio::time::timeout(
        Duration::from_millis(100),
        manager.send(SendContext::new(Envelope::new("events", "fast"))),
    )
    .await
    .expect("send not blocked")
    .expect("send");
    assert_eq!(receipt.topic, "events");
    assert!(matches!(slow.await.expect("join"), Err(MeshError::Timeout { .. })));
}

#[tokio::test]
async fn wire_entries_publish_through_the_registry() {
    let registry = GroupRegistry::new(MeshConfig::new("wire-test"), ConnectorCatalog::with_builtin());
    let manager = registry.ensure_started("wire-producer").await.expect("start");
    let family = ProtocolFamily::MeshMessage;
    let context = registry.wire_context("wire-producer", family);

    let envelope = Envelope::new("orders", "single").with_extension("region", "eu");
    let message: SimpleMessage = to_simple_message(&envelope, &context, family).expect("egress");
    let receipt = manager.publish_wire(&message, family).await.expect("publish");
    assert_eq!(receipt.topic, "orders");
    assert_eq!(receipt.message_id, envelope.unique_id);

    let batch = to_batch_message(
        &[Envelope::new("orders", "a"), Envelope::new("orders", "b")],
        &context,
        family,
    )
    .expect("batch");
    let receipts = manager
        .publish_batch_wire(&batch, family)
        .await
        .expect("publish batch");
    assert_eq!(receipts.len(), 2);
}
