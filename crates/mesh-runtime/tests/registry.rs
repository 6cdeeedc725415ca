//! 注册表：并发首次引用、组设置回退、请求头派生与整体关闭。

use std::sync::Arc;

use futures::future::join_all;
use mesh_protocol::{ProtocolFamily, SpecVersion, Transport, constants};
use mesh_runtime::{
    ConnectorCatalog, Credentials, GroupConfig, GroupRegistry, GroupRole, LifecycleState, MeshConfig,
    identity,
};

fn registry() -> GroupRegistry {
    let mut config = MeshConfig::new("mesh-a").with_group(GroupConfig {
        name: "orders-consumer".into(),
        role: GroupRole::Consumer,
        credentials: Some(Credentials {
            username: "svc".into(),
            password: "secret".into(),
        }),
    });
    config.idc = "az1".into();
    config.server.transport = Transport::Http;
    GroupRegistry::new(config, ConnectorCatalog::with_builtin())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_creates_one_manager() {
    let registry = Arc::new(registry());
    let tasks = (0..32).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.ensure_started("orders").await })
    });
    let managers: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("join").expect("ensure_started"))
        .collect();

    assert_eq!(registry.len(), 1);
    assert!(managers.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(managers[0].state(), LifecycleState::Started);
}

#[tokio::test]
async fn empty_group_name_is_rejected() {
    let err = registry().ensure_started("  ").await.expect_err("empty");
    assert_eq!(err.code(), "mesh.invalid_argument");
}

#[test]
fn undeclared_groups_fall_back_to_producer() {
    let registry = registry();
    assert_eq!(registry.group_config("adhoc"), GroupConfig::producer("adhoc"));
    assert_eq!(
        registry.group_config("orders-consumer").role,
        GroupRole::Consumer
    );
    assert!(registry.get("adhoc").is_none());
    assert!(registry.is_empty());
}

#[test]
fn request_header_uses_mesh_identity() {
    let registry = registry();
    let header = registry.request_header("orders-consumer", constants::PROTOCOL_CLOUD_EVENTS);
    assert_eq!(header.username, "svc");
    assert_eq!(header.idc, "az1");
    assert_eq!(header.group, "orders-consumer");
    assert_eq!(header.protocol_desc, "http");
    assert_eq!(header.protocol_version, SpecVersion::LATEST.as_str());

    let context = registry.wire_context("orders-consumer", ProtocolFamily::MeshMessage);
    assert_eq!(context.producer_group, "orders-consumer");
    assert_eq!(context.header.protocol_type, constants::PROTOCOL_MESH_MESSAGE);
    assert_eq!(
        registry.client_id("orders-consumer"),
        identity::mesh_client_id("orders-consumer", "mesh-a")
    );
}

#[tokio::test]
async fn shutdown_all_releases_every_group() {
    let registry = registry();
    let a = registry.ensure_started("a").await.expect("a");
    let b = registry.ensure_started("orders-consumer").await.expect("b");
    assert!(b.instance_id().is_some_and(|id| id.starts_with("orders-consumer(mesh-a)")));

    registry.shutdown_all().await;
    assert_eq!(a.state(), LifecycleState::Uninitialized);
    assert_eq!(b.state(), LifecycleState::Uninitialized);
    assert_eq!(registry.len(), 2);

    let again = registry.ensure_started("a").await.expect("restart");
    assert!(Arc::ptr_eq(&a, &again));
    assert!(again.is_started());
}

#[tokio::test]
async fn padded_and_plain_names_share_one_manager() {
    let registry = registry();
    let padded = registry.get_or_create(" orders ");
    let started = registry.ensure_started("orders").await.expect("start");

    assert!(Arc::ptr_eq(&padded, &started));
    assert_eq!(registry.len(), 1);
    assert!(registry.get("  orders").is_some_and(|m| Arc::ptr_eq(&m, &started)));
    assert_eq!(padded.group(), "orders");
}
