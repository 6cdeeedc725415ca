//! # 请求头
//!
//! ## 意图（Why）
//! - 环境、机房、子系统、调用方 IP/PID、凭据与协议声明属于“每次逻辑请求一次”的上下文，
//!   不随消息持久化；批量消息的全部条目共享同一份请求头。
//!
//! ## 契约（What）
//! - [`RequestHeader::build`] 对缺失的客户端身份不报错：所有身份字段取空串，
//!   协议版本取最新的 CloudEvents 规范版本，协议描述取传输名称；
//! - 本机地址在首次使用时探测并缓存，探测失败回落到回环地址。

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, UdpSocket},
    sync::OnceLock,
};

use serde::{Deserialize, Serialize};

use crate::cloudevents::SpecVersion;

/// 网格前端的传输种类。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Grpc,
    Tcp,
}

impl Transport {
    /// 传输名称，即请求头中的 `protocol_desc`。
    pub const fn as_str(self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Grpc => "grpc",
            Transport::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 构造请求头所需的客户端身份。
///
/// # 教案式说明
/// - **意图 (Why)**：把配置来源（客户端配置或网格运行时配置）与请求头解耦，转换器只关心字段值；
/// - **契约 (What)**：字段均为拥有所有权的字符串，空串表示未配置；
/// - **风险 (Trade-offs)**：口令以明文保存在内存中，`Debug` 输出会将其遮蔽。
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub env: String,
    pub idc: String,
    pub sys: String,
    pub language: String,
    pub username: String,
    pub password: String,
    pub group: String,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("env", &self.env)
            .field("idc", &self.idc)
            .field("sys", &self.sys)
            .field("language", &self.language)
            .field("username", &self.username)
            .field("password", &"***")
            .field("group", &self.group)
            .finish()
    }
}

/// 附着于单次调用的请求头。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    pub env: String,
    pub idc: String,
    pub sys: String,
    pub ip: String,
    pub pid: String,
    pub language: String,
    pub username: String,
    pub password: String,
    pub protocol_type: String,
    pub protocol_desc: String,
    pub protocol_version: String,
    pub group: String,
}

impl RequestHeader {
    /// 由客户端身份构造请求头。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `identity`：可缺省；缺省时身份相关字段均为空串，调用不会失败；
    ///   - `protocol_type`：声明的协议族名称，例如 `cloudevents`；
    ///   - `transport`：决定 `protocol_desc`；
    ///   - **后置条件**：`protocol_version` 恒为 [`SpecVersion::LATEST`]，`ip`/`pid` 取当前进程。
    pub fn build(
        identity: Option<&ClientIdentity>,
        protocol_type: &str,
        transport: Transport,
    ) -> Self {
        let identity = identity.cloned().unwrap_or_default();
        Self {
            env: identity.env,
            idc: identity.idc,
            sys: identity.sys,
            ip: local_address().to_string(),
            pid: std::process::id().to_string(),
            language: if identity.language.is_empty() {
                DEFAULT_LANGUAGE.to_owned()
            } else {
                identity.language
            },
            username: identity.username,
            password: identity.password,
            protocol_type: protocol_type.to_owned(),
            protocol_desc: transport.as_str().to_owned(),
            protocol_version: SpecVersion::LATEST.as_str().to_owned(),
            group: identity.group,
        }
    }
}

/// 未配置语言标签时写入请求头的默认值。
pub const DEFAULT_LANGUAGE: &str = "RUST";

/// 当前主机的出口地址。
///
/// 通过对外部地址执行无数据的 UDP `connect` 让内核选路，不会真正发送报文；结果进程内缓存。
pub fn local_address() -> IpAddr {
    static LOCAL: OnceLock<IpAddr> = OnceLock::new();
    *LOCAL.get_or_init(|| probe_local_address().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)))
}

fn probe_local_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_yields_defaults() {
        let header = RequestHeader::build(None, "cloudevents", Transport::Grpc);
        assert_eq!(header.protocol_version, "1.0");
        assert_eq!(header.protocol_desc, "grpc");
        assert_eq!(header.protocol_type, "cloudevents");
        assert!(header.env.is_empty());
        assert_eq!(header.pid, std::process::id().to_string());
    }

    #[test]
    fn identity_fields_are_copied() {
        let identity = ClientIdentity {
            env: "PRD".into(),
            idc: "FT".into(),
            sys: "0101".into(),
            language: "JAVA".into(),
            username: "mesh".into(),
            password: "secret".into(),
            group: "pg".into(),
        };
        let header = RequestHeader::build(Some(&identity), "eventmeshmessage", Transport::Http);
        assert_eq!(header.idc, "FT");
        assert_eq!(header.language, "JAVA");
        assert_eq!(header.group, "pg");
        assert_eq!(header.protocol_desc, "http");
        assert!(!format!("{identity:?}").contains("secret"));
    }
}
