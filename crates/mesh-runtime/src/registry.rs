//! # GroupRegistry：组名到管理器的映射
//!
//! ## 核心意图（Why）
//! - 进程内每个组名对应唯一的 [`GroupManager`]，首次引用时惰性创建，之后在进程生命周期内保留；
//! - 注册表是显式构造并按引用传递的对象，不依赖全局静态状态。
//!
//! ## 行为契约（What）
//! - 并发的首次引用只会创建一个管理器，所有调用者拿到同一个 `Arc`；
//! - 条目没有淘汰策略，只有 [`GroupRegistry::shutdown_all`] 会关闭它们（条目本身仍保留，可再次启动）；
//! - 同时负责派生组的客户端标识与请求头。
//!
//! ## 风险提示（Trade-offs）
//! - `DashMap` 的分片锁只在插入/查询的瞬间持有，生命周期跃迁在锁外执行。

use std::sync::Arc;

use dashmap::DashMap;
use mesh_protocol::{ProtocolFamily, RequestHeader, WireContext};
use tracing::{info, warn};

use crate::{
    config::{GroupConfig, MeshConfig},
    connector::ConnectorCatalog,
    error::MeshError,
    group::GroupManager,
    identity,
};

/// 进程内的组注册表。
pub struct GroupRegistry {
    config: Arc<MeshConfig>,
    catalog: Arc<ConnectorCatalog>,
    groups: DashMap<Arc<str>, Arc<GroupManager>>,
}

impl GroupRegistry {
    pub fn new(config: MeshConfig, catalog: ConnectorCatalog) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            groups: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ConnectorCatalog {
        &self.catalog
    }

    /// 取得组的管理器，不存在时创建。组名去除首尾空白后作为键。
    pub fn get_or_create(&self, group: &str) -> Arc<GroupManager> {
        let group = group.trim();
        if let Some(manager) = self.groups.get(group) {
            return Arc::clone(manager.value());
        }
        let manager = self
            .groups
            .entry(Arc::from(group))
            .or_insert_with(|| Arc::new(GroupManager::new(group, Arc::clone(&self.catalog))));
        Arc::clone(manager.value())
    }

    pub fn get(&self, group: &str) -> Option<Arc<GroupManager>> {
        self.groups.get(group.trim()).map(|manager| Arc::clone(manager.value()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 组的设置：配置中声明的优先，否则按无凭据的生产组处理。
    pub fn group_config(&self, group: &str) -> GroupConfig {
        let group = group.trim();
        self.config
            .group(group)
            .cloned()
            .unwrap_or_else(|| GroupConfig::producer(group))
    }

    /// 取得组的管理器并确保其处于 `Started`。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：空组名返回 [`MeshError::InvalidArgument`]；初始化与启动各自幂等，
    ///   并发调用只会构造一个连接器；任一步失败时返回错误，管理器保持失败前的状态。
    pub async fn ensure_started(&self, group: &str) -> Result<Arc<GroupManager>, MeshError> {
        let group = group.trim();
        if group.is_empty() {
            return Err(MeshError::invalid_argument("group name must not be empty"));
        }
        let manager = self.get_or_create(group);
        manager
            .initialize(&self.config, &self.group_config(group))
            .await?;
        manager.start().await?;
        Ok(manager)
    }

    /// 组在集群中的客户端 ID。
    pub fn client_id(&self, group: &str) -> String {
        identity::mesh_client_id(group, &self.config.cluster)
    }

    /// 以网格身份为组构造请求头，协议描述取服务端配置的传输。
    pub fn request_header(&self, group: &str, protocol_type: &str) -> RequestHeader {
        let identity = self.config.identity_for(&self.group_config(group));
        RequestHeader::build(Some(&identity), protocol_type, self.config.server.transport)
    }

    /// 组出站翻译所需的上下文。
    pub fn wire_context(&self, group: &str, family: ProtocolFamily) -> WireContext {
        WireContext::new(self.request_header(group, family.as_str()), group)
    }

    /// 关闭全部组。单个组的失败只记录告警，不影响其余组。
    pub async fn shutdown_all(&self) {
        // 先收集再逐个关闭，避免跨 await 持有分片锁。
        let managers: Vec<Arc<GroupManager>> = self
            .groups
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for manager in managers {
            if let Err(err) = manager.shutdown().await {
                warn!(group = manager.group(), code = err.code(), error = %err, "group shutdown failed");
            }
        }
        info!(groups = self.groups.len(), "all groups shut down");
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("cluster", &self.config.cluster)
            .field("groups", &self.groups.len())
            .finish()
    }
}
