use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::error::MeshError;

use super::Connector;

/// 构造连接器实例的工厂。每次调用必须返回一个新的实例。
pub type ConnectorFactory = Arc<dyn Fn() -> Arc<dyn Connector> + Send + Sync>;

/// 插件标识到连接器工厂的映射。
///
/// # 教案式说明
/// - **意图 (Why)**：组初始化时按配置的插件标识一次性解析出工厂，运行时不再以字符串分派；
/// - **契约 (What)**：注册同名插件会覆盖旧工厂，已构造的连接器不受影响；
///   未注册的标识在 [`ConnectorCatalog::create`] 时返回 [`MeshError::InvalidArgument`]；
/// - **风险 (Trade-offs)**：`DashMap` 允许运行期注册，但注册晚于组初始化时该组不会感知。
#[derive(Default)]
pub struct ConnectorCatalog {
    factories: DashMap<String, ConnectorFactory>,
}

impl ConnectorCatalog {
    /// 空目录。
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置插件的目录。启用 `standalone` 特性时包含进程内连接器，
    /// 由该目录构造的全部 `standalone` 实例共享同一个进程内代理。
    pub fn with_builtin() -> Self {
        let catalog = Self::new();
        #[cfg(feature = "standalone")]
        {
            let broker = Arc::new(super::standalone::StandaloneBroker::default());
            catalog.register_factory(
                super::standalone::PLUGIN,
                super::standalone::StandaloneConnector::factory(broker),
            );
        }
        catalog
    }

    pub fn register<F>(&self, plugin: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        self.register_factory(plugin, Arc::new(factory));
    }

    pub fn register_factory(&self, plugin: impl Into<String>, factory: ConnectorFactory) {
        self.factories.insert(plugin.into(), factory);
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.factories.contains_key(plugin)
    }

    /// 已注册的插件标识，按字典序排列。
    pub fn plugins(&self) -> Vec<String> {
        let mut plugins: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        plugins.sort();
        plugins
    }

    /// 为给定插件构造新的连接器实例。
    pub fn create(&self, plugin: &str) -> Result<Arc<dyn Connector>, MeshError> {
        // 先克隆工厂再调用，避免在持有分片锁时执行用户代码。
        let factory = self
            .factories
            .get(plugin)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                MeshError::invalid_argument(format!("unknown connector plugin `{plugin}`"))
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for ConnectorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorCatalog")
            .field("plugins", &self.plugins())
            .finish()
    }
}
