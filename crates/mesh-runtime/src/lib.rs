#![doc = r#"
# mesh-runtime

## 设计动机（Why）
- **定位**：事件网格的运行时核心，负责“每个生产/消费组独占一个连接器实例”的生命周期管理，
  并把前端交来的信封委派给连接器完成投递、请求-应答与回复。
- **架构角色**：前端（HTTP/gRPC/TCP）经 [`mesh_protocol`] 把线路对象归一为信封后，
  通过 [`GroupRegistry`] 找到组对应的 [`GroupManager`]，再由管理器委派到 [`Connector`]。
- **设计理念**：生命周期跃迁串行化，发送路径无锁读取；连接器按插件标识从 [`ConnectorCatalog`]
  构造，运行时不感知具体后端。

## 核心契约（What）
- 组管理器状态机：`Uninitialized → Initialized → Started`，`shutdown` 仅在 `Started` 时生效并回到
  `Uninitialized`；三个跃迁各自幂等，且并发调用时只有一个调用者执行真实副作用；
- 发送族操作要求处于 `Started`，否则返回 [`MeshError::LifecycleMisuse`] 且不触达连接器；
- 请求-应答受超时约束，超时返回 [`MeshError::Timeout`]，关闭时未完成的请求以投递错误结束。

## 风险与考量（Trade-offs）
- 连接器关闭失败只记录告警并照常清理状态，宁可放弃严格事务性也不泄漏组；
- 内置 `standalone` 连接器仅在进程内广播，适合开发与测试，不提供持久化。
"#]

pub mod config;
pub mod connector;
pub mod error;
pub mod group;
pub mod identity;
pub mod registry;
pub mod telemetry;

pub use config::{ConfigError, Credentials, GroupConfig, GroupRole, MeshConfig, ServerConfig};
pub use connector::{
    Connector, ConnectorCatalog, ConnectorFactory, ConnectorProperties, SendReceipt,
};
pub use error::{ConnectorFailureKind, MeshError};
pub use group::{GroupManager, LifecycleState, SendContext};
pub use registry::GroupRegistry;

#[cfg(feature = "standalone")]
pub use connector::standalone::{StandaloneBroker, StandaloneConnector};

pub type Result<T, E = MeshError> = core::result::Result<T, E>;
