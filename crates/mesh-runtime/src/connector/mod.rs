//! # 连接器能力接口
//!
//! ## 意图（Why）
//! - 每种消息后端以一个插件实现 [`Connector`]，运行时只依赖能力集合
//!   `{send, request_reply, reply, batch_send, lifecycle}`；
//! - 完成结果以 `Future` 的返回值交付，恰好一次，替代回调式通知。
//!
//! ## 契约（What）
//! - 生命周期钩子各自幂等；发送族调用只在 `start` 成功后、`shutdown` 之前有效，
//!   状态之外的调用返回 [`MeshError::LifecycleMisuse`]；
//! - `request_reply` 必须在 `timeout` 内返回，超时返回 [`MeshError::Timeout`]；
//!   同一连接器上的多个请求可并发等待，互不阻塞；
//! - `shutdown` 时仍在等待的请求以 [`MeshError::ConnectorRuntime`] 结束，不得静默丢弃。

mod catalog;
#[cfg(feature = "standalone")]
pub mod standalone;

use std::time::Duration;

use async_trait::async_trait;
use mesh_protocol::Envelope;

use crate::{config::GroupRole, error::MeshError};

pub use catalog::{ConnectorCatalog, ConnectorFactory};

/// 组管理器在初始化时交给连接器的配置。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectorProperties {
    /// 组名。
    pub group: String,
    /// 组名与集群派生的实例 ID，见 [`crate::identity::mesh_client_id`]。
    pub instance_id: String,
    pub cluster: String,
    pub idc: String,
    pub role: GroupRole,
    pub request_timeout: Duration,
}

/// 单条投递的回执。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendReceipt {
    pub topic: String,
    pub message_id: String,
}

impl SendReceipt {
    pub fn for_envelope(envelope: &Envelope) -> Self {
        let message_id = if envelope.id.is_empty() {
            envelope.unique_id.clone()
        } else {
            envelope.id.clone()
        };
        Self {
            topic: envelope.topic.clone(),
            message_id,
        }
    }
}

/// 可插拔的消息后端。
///
/// # 教案式说明
/// - **意图 (Why)**：把具体后端隔离在插件内，组管理器只持有 `Arc<dyn Connector>`；
/// - **契约 (What)**：全部方法接收 `&self`，实现需自行处理内部同步；
///   实例由 [`ConnectorCatalog`] 构造，并且只被一个组独占；
/// - **风险 (Trade-offs)**：`async_trait` 会为每次调用分配一个 boxed future，换取对象安全。
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// 插件标识，例如 `standalone`。
    fn plugin(&self) -> &str;

    async fn initialize(&self, properties: &ConnectorProperties) -> Result<(), MeshError>;

    async fn start(&self) -> Result<(), MeshError>;

    async fn shutdown(&self) -> Result<(), MeshError>;

    /// 单向投递。
    async fn send(&self, envelope: Envelope) -> Result<SendReceipt, MeshError>;

    /// 投递并等待以 `sequence_number` 关联的回复。
    async fn request_reply(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope, MeshError>;

    /// 回复此前的请求，关联键同 [`Connector::request_reply`]。
    async fn reply(&self, envelope: Envelope) -> Result<SendReceipt, MeshError>;

    /// 按输入顺序批量投递，回执顺序与输入一致。
    async fn batch_send(&self, envelopes: Vec<Envelope>) -> Result<Vec<SendReceipt>, MeshError>;
}
