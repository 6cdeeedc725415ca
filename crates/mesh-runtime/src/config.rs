//! # 网格配置
//!
//! ## 意图（Why）
//! - 以单个 TOML 文件描述服务端地址、环境标签、集群身份、连接器插件与各组设置，
//!   运行时在组初始化时读取，之后视为不可变；
//! - 解析与校验分离：`serde` 负责形状，[`MeshConfig::validate`] 负责业务约束。
//!
//! ## 契约（What）
//! - `cluster` 与 `connector_plugin_type` 不可为空；组名不可为空且互不重复；
//! - 缺省值：插件 `standalone`，请求超时 3000 ms，传输 `grpc`，端口 10205。

use std::{fmt, path::Path, path::PathBuf, time::Duration};

use mesh_protocol::{ClientIdentity, Transport, header::DEFAULT_LANGUAGE};
use serde::Deserialize;
use thiserror::Error;

/// 缺省连接器插件。
pub const DEFAULT_PLUGIN: &str = "standalone";
/// 缺省请求-应答超时（毫秒）。
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;

/// 配置加载错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {detail}")]
    Invalid { detail: String },
}

impl ConfigError {
    fn invalid(detail: impl Into<String>) -> Self {
        ConfigError::Invalid {
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "mesh.config.io",
            ConfigError::Parse(_) => "mesh.config.parse",
            ConfigError::Invalid { .. } => "mesh.config.invalid",
        }
    }
}

/// 前端服务端监听配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub transport: Transport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 10205,
            transport: Transport::Grpc,
        }
    }
}

/// 组角色。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    #[default]
    Producer,
    Consumer,
}

impl GroupRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            GroupRole::Producer => "producer",
            GroupRole::Consumer => "consumer",
        }
    }
}

/// 组级凭据。
#[derive(Clone, Default, Deserialize, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 单个生产/消费组的配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub role: GroupRole,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl GroupConfig {
    /// 未在配置文件中声明的组按无凭据的生产组处理。
    pub fn producer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: GroupRole::Producer,
            credentials: None,
        }
    }
}

/// 网格运行时配置根。
///
/// # 教案式说明
/// - **意图 (Why)**：集中承载组初始化所需的全部输入，组管理器在初始化时读取并冻结；
/// - **契约 (What)**：通过 [`MeshConfig::from_toml_str`] 或 [`MeshConfig::load`] 构造的实例均已校验；
/// - **风险 (Trade-offs)**：不支持热更新，修改配置需要重启进程或重新初始化组。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct MeshConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub idc: String,
    #[serde(default)]
    pub sys: String,
    pub cluster: String,
    #[serde(default = "default_plugin")]
    pub connector_plugin_type: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_plugin() -> String {
    DEFAULT_PLUGIN.to_owned()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl MeshConfig {
    /// 以集群名构造其余字段取缺省值的配置，主要供嵌入式使用与测试。
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            env: String::new(),
            idc: String::new(),
            sys: String::new(),
            cluster: cluster.into(),
            connector_plugin_type: default_plugin(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MeshConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::invalid("`cluster` must not be empty"));
        }
        if self.connector_plugin_type.trim().is_empty() {
            return Err(ConfigError::invalid(
                "`connector_plugin_type` must not be empty",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("`request_timeout_ms` must be positive"));
        }
        let mut seen = std::collections::HashSet::new();
        for group in &self.groups {
            let name = group.name.trim();
            if name.is_empty() {
                return Err(ConfigError::invalid("group name must not be empty"));
            }
            if !seen.insert(name) {
                return Err(ConfigError::invalid(format!(
                    "group `{name}` is declared more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 构造某个组发出请求时使用的客户端身份。
    pub fn identity_for(&self, group: &GroupConfig) -> ClientIdentity {
        let credentials = group.credentials.clone().unwrap_or_default();
        ClientIdentity {
            env: self.env.clone(),
            idc: self.idc.clone(),
            sys: self.sys.clone(),
            language: DEFAULT_LANGUAGE.to_owned(),
            username: credentials.username,
            password: credentials.password,
            group: group.name.clone(),
        }
    }
}
