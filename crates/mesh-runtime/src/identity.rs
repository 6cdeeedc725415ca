//! 客户端/实例标识的派生规则。
//!
//! 这些字符串会出现在连接器的实例 ID 与请求头中，格式需与其他语言的 SDK 保持一致；
//! 所有输入在拼接前去除首尾空白。

/// 写入标识的网格版本号。
pub const MESH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 组在集群中的客户端 ID：`{group}({cluster})-{version}-{pid}`。
pub fn mesh_client_id(group: &str, cluster: &str) -> String {
    format!(
        "{}({})-{}-{}",
        group.trim(),
        cluster.trim(),
        MESH_VERSION,
        std::process::id()
    )
}

/// TCP 前端的客户端 ID：`{sys}-{purpose}-{cluster}-{version}-{pid}`。
pub fn mesh_tcp_client_id(sys: &str, purpose: &str, cluster: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        sys.trim(),
        purpose.trim(),
        cluster.trim(),
        MESH_VERSION,
        std::process::id()
    )
}

/// TCP 客户端握手时上报的用户代理。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserAgent {
    pub subsystem: String,
    pub pid: u32,
    pub host: String,
    pub port: u16,
}

/// 由用户代理派生的客户端 ID：`{subsystem}--{pid}-{host}:{port}`；没有用户代理时返回 `None`。
pub fn user_agent_client_id(agent: Option<&UserAgent>) -> Option<String> {
    agent.map(|agent| {
        format!(
            "{}--{}-{}:{}",
            agent.subsystem.trim(),
            agent.pid,
            agent.host.trim(),
            agent.port
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_shapes() {
        let pid = std::process::id();
        assert_eq!(
            mesh_client_id(" orders ", "mesh-a"),
            format!("orders(mesh-a)-{MESH_VERSION}-{pid}")
        );
        assert_eq!(
            mesh_tcp_client_id("5001", "pub", "mesh-a"),
            format!("5001-pub-mesh-a-{MESH_VERSION}-{pid}")
        );
    }

    #[test]
    fn user_agent_id() {
        assert_eq!(user_agent_client_id(None), None);
        let agent = UserAgent {
            subsystem: "5001".into(),
            pid: 42,
            host: "10.0.0.1".into(),
            port: 8080,
        };
        assert_eq!(
            user_agent_client_id(Some(&agent)).as_deref(),
            Some("5001--42-10.0.0.1:8080")
        );
    }
}
