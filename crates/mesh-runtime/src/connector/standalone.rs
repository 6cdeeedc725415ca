//! # standalone：进程内连接器
//!
//! ## 意图（Why）
//! - 不依赖外部消息系统即可跑通完整链路，供开发、单机部署与测试使用；
//! - 多个组的连接器共享同一个 [`StandaloneBroker`]，生产组投递的消息可被同进程的消费侧订阅。
//!
//! ## 契约（What）
//! - 每个主题一条 `broadcast` 通道加一段有界的保留日志；无订阅者时消息仅进入日志；
//! - 请求-应答以请求的 `sequence_number` 为关联键，回复经 [`Connector::reply`] 投递；
//!   没有等待者的回复按普通消息发布到其主题；
//! - 连接器关闭时，以投递错误结束它名下全部未完成的请求。
//!
//! ## 风险（Trade-offs）
//! - 订阅者消费过慢时 `broadcast` 会丢弃最旧的消息，订阅端收到 `Lagged`；
//! - 保留日志按条数截断，不做持久化。

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use mesh_protocol::Envelope;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use crate::{
    error::{ConnectorFailureKind, MeshError},
    group::LifecycleState,
};

use super::{Connector, ConnectorFactory, ConnectorProperties, SendReceipt};

/// 插件标识。
pub const PLUGIN: &str = "standalone";

/// 每个主题保留的消息条数，同时作为广播通道容量。
pub const TOPIC_RETENTION: usize = 1024;

type ReplySender = oneshot::Sender<Result<Envelope, MeshError>>;

struct TopicChannel {
    sender: broadcast::Sender<Envelope>,
    log: Mutex<VecDeque<Envelope>>,
}

impl TopicChannel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(TOPIC_RETENTION);
        Self {
            sender,
            log: Mutex::new(VecDeque::with_capacity(16)),
        }
    }
}

struct PendingRequest {
    owner: u64,
    request: Envelope,
    reply: ReplySender,
}

/// 进程内代理：主题通道、保留日志与等待回复的请求表。
#[derive(Default)]
pub struct StandaloneBroker {
    topics: DashMap<String, Arc<TopicChannel>>,
    pending: DashMap<String, PendingRequest>,
    next_owner: AtomicU64,
}

impl StandaloneBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅主题；只会收到订阅之后发布的消息。
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Envelope> {
        self.channel(topic).sender.subscribe()
    }

    /// 主题保留日志的快照，按发布顺序排列。
    pub fn retained(&self, topic: &str) -> Vec<Envelope> {
        self.topics
            .get(topic)
            .map(|channel| channel.log.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 仍在等待回复的请求数。
    pub fn outstanding_requests(&self) -> usize {
        self.pending.len()
    }

    fn channel(&self, topic: &str) -> Arc<TopicChannel> {
        if let Some(channel) = self.topics.get(topic) {
            return Arc::clone(channel.value());
        }
        Arc::clone(
            self.topics
                .entry(topic.to_owned())
                .or_insert_with(|| Arc::new(TopicChannel::new()))
                .value(),
        )
    }

    fn publish(&self, envelope: Envelope) -> SendReceipt {
        let receipt = SendReceipt::for_envelope(&envelope);
        let channel = self.channel(&envelope.topic);
        {
            let mut log = channel.log.lock();
            if log.len() == TOPIC_RETENTION {
                log.pop_front();
            }
            log.push_back(envelope.clone());
        }
        // 没有订阅者时 send 返回错误，消息仍留在日志中。
        let receivers = channel.sender.send(envelope).unwrap_or(0);
        debug!(topic = %receipt.topic, message_id = %receipt.message_id, receivers, "published");
        receipt
    }

    fn register(
        &self,
        owner: u64,
        request: &Envelope,
    ) -> Result<oneshot::Receiver<Result<Envelope, MeshError>>, MeshError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(request.sequence_number.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(MeshError::invalid_argument(format!(
                "a request with sequence number `{}` is already outstanding",
                request.sequence_number
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    owner,
                    request: request.clone(),
                    reply: tx,
                });
                Ok(rx)
            }
        }
    }

    fn complete(&self, reply: Envelope) -> SendReceipt {
        match self.pending.remove(&reply.sequence_number) {
            Some((_, pending)) => {
                let receipt = SendReceipt::for_envelope(&reply);
                // 等待者可能已超时离开。
                let _ = pending.reply.send(Ok(reply));
                receipt
            }
            None => self.publish(reply),
        }
    }

    fn forget(&self, key: &str, owner: u64) {
        self.pending.remove_if(key, |_, pending| pending.owner == owner);
    }

    fn fail_owned_by(&self, owner: u64) -> usize {
        let keys: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.key().clone())
            .collect();
        let mut failed = 0;
        for key in keys {
            if let Some((_, pending)) = self.pending.remove_if(&key, |_, p| p.owner == owner) {
                let err = MeshError::classify(
                    Some(&pending.request),
                    "connector shut down while the request was outstanding",
                );
                let _ = pending.reply.send(Err(err));
                failed += 1;
            }
        }
        failed
    }
}

/// 移除超时或被取消的等待项。
struct PendingGuard<'a> {
    broker: &'a StandaloneBroker,
    key: String,
    owner: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.broker.forget(&self.key, self.owner);
    }
}

struct State {
    phase: LifecycleState,
    group: String,
}

/// 基于 [`StandaloneBroker`] 的连接器实例。
pub struct StandaloneConnector {
    id: u64,
    broker: Arc<StandaloneBroker>,
    state: Mutex<State>,
}

impl StandaloneConnector {
    pub fn new(broker: Arc<StandaloneBroker>) -> Self {
        let id = broker.next_owner.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            broker,
            state: Mutex::new(State {
                phase: LifecycleState::Uninitialized,
                group: String::new(),
            }),
        }
    }

    /// 共享同一代理的连接器工厂。
    pub fn factory(broker: Arc<StandaloneBroker>) -> ConnectorFactory {
        Arc::new(move || Arc::new(StandaloneConnector::new(Arc::clone(&broker))) as Arc<dyn Connector>)
    }

    pub fn broker(&self) -> &Arc<StandaloneBroker> {
        &self.broker
    }

    fn ensure_started(&self, operation: &'static str) -> Result<(), MeshError> {
        self.while_started(operation, || Ok(()))
    }

    /// 在持有状态锁、确认已启动的前提下执行 `action`，与 `shutdown` 的状态切换互斥。
    fn while_started<T>(
        &self,
        operation: &'static str,
        action: impl FnOnce() -> Result<T, MeshError>,
    ) -> Result<T, MeshError> {
        let state = self.state.lock();
        if state.phase == LifecycleState::Started {
            action()
        } else {
            Err(MeshError::lifecycle(&state.group, operation, state.phase))
        }
    }
}

#[async_trait]
impl Connector for StandaloneConnector {
    fn plugin(&self) -> &str {
        PLUGIN
    }

    async fn initialize(&self, properties: &ConnectorProperties) -> Result<(), MeshError> {
        let mut state = self.state.lock();
        if state.phase == LifecycleState::Uninitialized {
            state.group = properties.group.clone();
            state.phase = LifecycleState::Initialized;
            info!(group = %properties.group, instance = %properties.instance_id, "standalone connector initialized");
        }
        Ok(())
    }

    async fn start(&self) -> Result<(), MeshError> {
        let mut state = self.state.lock();
        match state.phase {
            LifecycleState::Uninitialized => {
                Err(MeshError::lifecycle(&state.group, "start", state.phase))
            }
            LifecycleState::Initialized => {
                state.phase = LifecycleState::Started;
                Ok(())
            }
            LifecycleState::Started => Ok(()),
        }
    }

    async fn shutdown(&self) -> Result<(), MeshError> {
        let group = {
            let mut state = self.state.lock();
            if state.phase == LifecycleState::Uninitialized {
                return Ok(());
            }
            state.phase = LifecycleState::Uninitialized;
            state.group.clone()
        };
        let failed = self.broker.fail_owned_by(self.id);
        info!(%group, failed_requests = failed, "standalone connector shut down");
        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> Result<SendReceipt, MeshError> {
        self.ensure_started("send")?;
        Ok(self.broker.publish(envelope))
    }

    async fn request_reply(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope, MeshError> {
        self.ensure_started("request_reply")?;
        if envelope.sequence_number.is_empty() {
            return Err(MeshError::invalid_argument(
                "request-reply needs a sequence number to correlate the reply",
            ));
        }

        // 登记必须发生在已启动状态内，否则关闭时的清扫可能错过这条请求。
        let rx = self.while_started("request_reply", || self.broker.register(self.id, &envelope))?;
        let _guard = PendingGuard {
            broker: &self.broker,
            key: envelope.sequence_number.clone(),
            owner: self.id,
        };
        self.broker.publish(envelope);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MeshError::connector(
                ConnectorFailureKind::Unclassified,
                "reply channel closed before a reply arrived",
            )),
            Err(_) => Err(MeshError::Timeout { timeout }),
        }
    }

    async fn reply(&self, envelope: Envelope) -> Result<SendReceipt, MeshError> {
        self.ensure_started("reply")?;
        Ok(self.broker.complete(envelope))
    }

    async fn batch_send(&self, envelopes: Vec<Envelope>) -> Result<Vec<SendReceipt>, MeshError> {
        self.ensure_started("batch_send")?;
        Ok(envelopes
            .into_iter()
            .map(|envelope| self.broker.publish(envelope))
            .collect())
    }
}
