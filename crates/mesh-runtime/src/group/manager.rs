//! # GroupManager：组生命周期管理器
//!
//! ## 核心意图（Why）
//! - 每个生产/消费组独占一个连接器实例，管理器负责构造、启动、关闭它，并把发送族调用委派过去；
//! - 生命周期跃迁少而昂贵，发送调用多而轻，因此二者走不同的同步路径。
//!
//! ## 行为契约（What）
//! - `initialize`：已初始化时为空操作；否则按配置的插件构造连接器并初始化，成功后进入 `Initialized`；
//! - `start`：已启动时为空操作；未初始化时返回 [`MeshError::LifecycleMisuse`]；
//! - `shutdown`：仅在 `Started` 时生效，关闭连接器后回到 `Uninitialized`；连接器关闭失败只记录告警；
//! - 构造、初始化或启动失败时状态保持跃迁前的值，可安全重试；
//! - 发送族调用要求 `Started`，否则返回 `LifecycleMisuse` 且不触达连接器。
//!
//! ## 并发模型（How）
//! - 跃迁由一把异步互斥锁串行化：同一时刻只有一个调用者执行副作用，其余调用者等待后观察新状态；
//! - 当前阶段保存在 `ArcSwap` 中，发送路径只做一次无锁加载，不与跃迁竞争；
//! - 发送期间若发生并发关闭，调用仍持有旧阶段中的连接器引用，由连接器返回其自身的状态错误。

use std::{fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use mesh_protocol::{BatchMessage, Envelope, Inbound, ProtocolFamily, SimpleMessage, translate};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::{GroupConfig, MeshConfig},
    connector::{Connector, ConnectorCatalog, ConnectorProperties, SendReceipt},
    error::MeshError,
    identity,
};

use super::{LifecycleState, SendContext};

struct Held {
    connector: Arc<dyn Connector>,
    properties: ConnectorProperties,
}

enum Phase {
    Uninitialized,
    Initialized(Arc<Held>),
    Started(Arc<Held>),
}

impl Phase {
    fn state(&self) -> LifecycleState {
        match self {
            Phase::Uninitialized => LifecycleState::Uninitialized,
            Phase::Initialized(_) => LifecycleState::Initialized,
            Phase::Started(_) => LifecycleState::Started,
        }
    }

    fn held(&self) -> Option<&Arc<Held>> {
        match self {
            Phase::Uninitialized => None,
            Phase::Initialized(held) | Phase::Started(held) => Some(held),
        }
    }
}

/// 单个组的生命周期管理器。
///
/// # 教案式说明
/// - **意图 (Why)**：把“一个组一个连接器”的约束落在类型上，连接器只通过管理器被访问；
/// - **契约 (What)**：组名构造后不可变；配置在 `initialize` 时冻结到连接器属性中；
///   管理器可被多个任务经 `Arc` 共享；
/// - **风险 (Trade-offs)**：跃迁锁跨越连接器的 `await`，慢连接器会让并发的跃迁调用一起等待，
///   但不会影响发送路径。
pub struct GroupManager {
    group: Arc<str>,
    catalog: Arc<ConnectorCatalog>,
    transition: Mutex<()>,
    phase: ArcSwap<Phase>,
}

impl GroupManager {
    pub fn new(group: impl Into<Arc<str>>, catalog: Arc<ConnectorCatalog>) -> Self {
        Self {
            group: group.into(),
            catalog,
            transition: Mutex::new(()),
            phase: ArcSwap::from_pointee(Phase::Uninitialized),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> LifecycleState {
        self.phase.load().state()
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    pub fn is_started(&self) -> bool {
        self.state().is_started()
    }

    /// 已初始化时返回连接器的实例 ID。
    pub fn instance_id(&self) -> Option<String> {
        self.phase
            .load()
            .held()
            .map(|held| held.properties.instance_id.clone())
    }

    /// 构造并初始化连接器。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `mesh`：提供集群、机房、插件标识与请求超时；
    ///   - `group`：组级设置，`name` 必须与管理器的组名一致；
    ///   - **后置条件**：成功时状态为 `Initialized`（或保持已有的 `Initialized`/`Started`）；
    ///     失败时状态不变且新构造的连接器被丢弃。
    pub async fn initialize(&self, mesh: &MeshConfig, group: &GroupConfig) -> Result<(), MeshError> {
        let _gate = self.transition.lock().await;
        let current = self.phase.load_full();
        if current.state().is_initialized() {
            debug!(group = %self.group, state = %current.state(), "initialize skipped");
            return Ok(());
        }
        if group.name != *self.group {
            return Err(MeshError::invalid_argument(format!(
                "group config `{}` does not belong to group `{}`",
                group.name, self.group
            )));
        }

        let plugin = mesh.connector_plugin_type.trim();
        let properties = ConnectorProperties {
            group: self.group.to_string(),
            instance_id: identity::mesh_client_id(&self.group, &mesh.cluster),
            cluster: mesh.cluster.clone(),
            idc: mesh.idc.clone(),
            role: group.role,
            request_timeout: mesh.request_timeout(),
        };
        let connector = self.catalog.create(plugin)?;
        if let Err(err) = connector.initialize(&properties).await {
            warn!(group = %self.group, plugin, code = err.code(), error = %err, "connector initialize failed");
            return Err(err);
        }

        info!(group = %self.group, plugin, instance = %properties.instance_id, "group initialized");
        self.phase
            .store(Arc::new(Phase::Initialized(Arc::new(Held { connector, properties }))));
        Ok(())
    }

    /// 启动已初始化的连接器。
    pub async fn start(&self) -> Result<(), MeshError> {
        let _gate = self.transition.lock().await;
        let current = self.phase.load_full();
        match &*current {
            Phase::Started(_) => {
                debug!(group = %self.group, "start skipped");
                Ok(())
            }
            Phase::Uninitialized => Err(MeshError::lifecycle(
                &self.group,
                "start",
                LifecycleState::Uninitialized,
            )),
            Phase::Initialized(held) => {
                held.connector.start().await?;
                self.phase.store(Arc::new(Phase::Started(Arc::clone(held))));
                info!(group = %self.group, plugin = held.connector.plugin(), "group started");
                Ok(())
            }
        }
    }

    /// 关闭连接器并释放组。
    pub async fn shutdown(&self) -> Result<(), MeshError> {
        let _gate = self.transition.lock().await;
        let current = self.phase.load_full();
        let Phase::Started(held) = &*current else {
            debug!(group = %self.group, state = %current.state(), "shutdown skipped");
            return Ok(());
        };

        if let Err(err) = held.connector.shutdown().await {
            warn!(
                group = %self.group,
                plugin = held.connector.plugin(),
                code = err.code(),
                error = %err,
                "connector shutdown failed, releasing group anyway"
            );
        }
        self.phase.store(Arc::new(Phase::Uninitialized));
        info!(group = %self.group, "group shut down");
        Ok(())
    }

    fn started(&self, operation: &'static str) -> Result<Arc<Held>, MeshError> {
        match &**self.phase.load() {
            Phase::Started(held) => Ok(Arc::clone(held)),
            other => Err(MeshError::lifecycle(&self.group, operation, other.state())),
        }
    }

    pub async fn send(&self, context: SendContext) -> Result<SendReceipt, MeshError> {
        let held = self.started("send")?;
        debug!(group = %self.group, %context, "send");
        held.connector.send(context.into_envelope()).await
    }

    /// 请求-应答。`timeout` 缺省时取配置的请求超时。
    ///
    /// 管理器在连接器自身的计时之外再加一层同样长度的上限，连接器未按时返回也会得到
    /// [`MeshError::Timeout`]。
    pub async fn request_reply(
        &self,
        context: SendContext,
        timeout: Option<Duration>,
    ) -> Result<Envelope, MeshError> {
        let held = self.started("request_reply")?;
        let timeout = timeout.unwrap_or(held.properties.request_timeout);
        debug!(group = %self.group, %context, ?timeout, "request_reply");
        let call = held.connector.request_reply(context.into_envelope(), timeout);
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(MeshError::Timeout { timeout }),
        }
    }

    pub async fn reply(&self, context: SendContext) -> Result<SendReceipt, MeshError> {
        let held = self.started("reply")?;
        debug!(group = %self.group, %context, "reply");
        held.connector.reply(context.into_envelope()).await
    }

    pub async fn batch_send(&self, contexts: Vec<SendContext>) -> Result<Vec<SendReceipt>, MeshError> {
        let held = self.started("batch_send")?;
        if contexts.is_empty() {
            return Err(MeshError::invalid_argument(
                "batch requires at least one message",
            ));
        }
        let envelopes = contexts.into_iter().map(SendContext::into_envelope).collect();
        held.connector.batch_send(envelopes).await
    }

    /// 前端入口：翻译单条紧凑线路消息并投递。响应形态的消息不可投递。
    pub async fn publish_wire(
        &self,
        message: &SimpleMessage,
        family: ProtocolFamily,
    ) -> Result<SendReceipt, MeshError> {
        let held = self.started("send")?;
        match translate::to_envelope(message, family)? {
            Inbound::Envelope(envelope) => held.connector.send(envelope).await,
            Inbound::Response(_) => Err(MeshError::invalid_argument(
                "response-shaped message cannot be published",
            )),
        }
    }

    /// 前端入口：翻译批量线路消息并按序投递。
    pub async fn publish_batch_wire(
        &self,
        batch: &BatchMessage,
        family: ProtocolFamily,
    ) -> Result<Vec<SendReceipt>, MeshError> {
        let held = self.started("batch_send")?;
        let envelopes = translate::from_batch_message(batch, family)?;
        held.connector.batch_send(envelopes).await
    }
}

impl fmt::Display for GroupManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.phase.load();
        let plugin = phase.held().map_or("-", |held| held.connector.plugin());
        write!(
            f,
            "groupManager={{group={},state={},plugin={}}}",
            self.group,
            phase.state(),
            plugin
        )
    }
}

impl fmt::Debug for GroupManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupManager")
            .field("group", &self.group)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;

    #[derive(Default)]
    struct Script {
        fail_initialize: bool,
        fail_start: bool,
        fail_shutdown: bool,
        shutdowns: AtomicUsize,
    }

    struct Scripted(Arc<Script>);

    #[async_trait]
    impl Connector for Scripted {
        fn plugin(&self) -> &str {
            "scripted"
        }

        async fn initialize(&self, _: &ConnectorProperties) -> Result<(), MeshError> {
            if self.0.fail_initialize {
                return Err(MeshError::classify(None, "broker unreachable"));
            }
            Ok(())
        }

        async fn start(&self) -> Result<(), MeshError> {
            if self.0.fail_start {
                return Err(MeshError::classify(None, "start refused"));
            }
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), MeshError> {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_shutdown {
                return Err(MeshError::classify(None, "socket already closed"));
            }
            Ok(())
        }

        async fn send(&self, envelope: Envelope) -> Result<SendReceipt, MeshError> {
            Ok(SendReceipt::for_envelope(&envelope))
        }

        async fn request_reply(&self, envelope: Envelope, _: Duration) -> Result<Envelope, MeshError> {
            Ok(envelope)
        }

        async fn reply(&self, envelope: Envelope) -> Result<SendReceipt, MeshError> {
            Ok(SendReceipt::for_envelope(&envelope))
        }

        async fn batch_send(&self, envelopes: Vec<Envelope>) -> Result<Vec<SendReceipt>, MeshError> {
            Ok(envelopes.iter().map(SendReceipt::for_envelope).collect())
        }
    }

    fn fixture(script: Arc<Script>) -> (GroupManager, MeshConfig, GroupConfig) {
        let catalog = ConnectorCatalog::new();
        catalog.register("scripted", move || Arc::new(Scripted(Arc::clone(&script))) as Arc<dyn Connector>);
        let mut mesh = MeshConfig::new("test-cluster");
        mesh.connector_plugin_type = "scripted".to_owned();
        (
            GroupManager::new("g1", Arc::new(catalog)),
            mesh,
            GroupConfig::producer("g1"),
        )
    }

    #[tokio::test]
    async fn start_before_initialize_is_misuse() {
        let (manager, _, _) = fixture(Arc::default());
        let err = manager.start().await.expect_err("not initialized");
        assert_eq!(err.code(), "mesh.lifecycle.misuse");
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn failed_transitions_keep_previous_state() {
        let script = Arc::new(Script {
            fail_initialize: true,
            ..Script::default()
        });
        let (manager, mesh, group) = fixture(script);
        assert!(manager.initialize(&mesh, &group).await.is_err());
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
        assert!(manager.instance_id().is_none());

        let script = Arc::new(Script {
            fail_start: true,
            ..Script::default()
        });
        let (manager, mesh, group) = fixture(script);
        manager.initialize(&mesh, &group).await.expect("init");
        assert!(manager.start().await.is_err());
        assert_eq!(manager.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn shutdown_is_a_no_op_unless_started() {
        let script = Arc::new(Script::default());
        let (manager, mesh, group) = fixture(Arc::clone(&script));
        manager.shutdown().await.expect("noop");
        manager.initialize(&mesh, &group).await.expect("init");
        manager.shutdown().await.expect("noop");
        assert_eq!(manager.state(), LifecycleState::Initialized);
        assert_eq!(script.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_plugin_fails_initialize() {
        let (manager, mut mesh, group) = fixture(Arc::default());
        mesh.connector_plugin_type = "rocketmq".to_owned();
        let err = manager.initialize(&mesh, &group).await.expect_err("unknown");
        assert_eq!(err.code(), "mesh.invalid_argument");
    }

    #[tokio::test]
    async fn display_reports_group_state_and_plugin() {
        let (manager, mesh, group) = fixture(Arc::default());
        assert_eq!(
            manager.to_string(),
            "groupManager={group=g1,state=uninitialized,plugin=-}"
        );
        manager.initialize(&mesh, &group).await.expect("init");
        manager.start().await.expect("start");
        assert_eq!(
            manager.to_string(),
            "groupManager={group=g1,state=started,plugin=scripted}"
        );
        assert!(manager.instance_id().is_some_and(|id| id.starts_with("g1(test-cluster)-")));
    }

    #[tokio::test]
    #[traced_test]
    async fn shutdown_failure_is_logged_and_group_released() {
        let script = Arc::new(Script {
            fail_shutdown: true,
            ..Script::default()
        });
        let (manager, mesh, group) = fixture(Arc::clone(&script));
        manager.initialize(&mesh, &group).await.expect("init");
        manager.start().await.expect("start");

        manager.shutdown().await.expect("shutdown is best effort");
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
        assert_eq!(script.shutdowns.load(Ordering::SeqCst), 1);
        assert!(logs_contain("connector shutdown failed"));
    }

    #[tokio::test]
    async fn wire_entry_rejects_response_shape() {
        let (manager, mesh, group) = fixture(Arc::default());
        manager.initialize(&mesh, &group).await.expect("init");
        manager.start().await.expect("start");
        let message = SimpleMessage {
            topic: "orders".into(),
            content: "{}".into(),
            ..SimpleMessage::default()
        };
        let err = manager
            .publish_wire(&message, ProtocolFamily::MeshMessage)
            .await
            .expect_err("response shape");
        assert_eq!(err.code(), "mesh.invalid_argument");
    }
}
