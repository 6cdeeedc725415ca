//! `meshd`：加载 TOML 配置，启动全部已声明的组，收到 Ctrl-C 后关闭。
//!
//! 用法：`meshd <config.toml>`。日志级别由 `RUST_LOG` 控制，缺省为 `info`。

use anyhow::Context;
use mesh_runtime::{ConnectorCatalog, GroupRegistry, MeshConfig, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: meshd <config.toml>")?;
    telemetry::init_tracing("info")?;

    let config = MeshConfig::load(&path).with_context(|| format!("loading {path}"))?;
    info!(
        cluster = %config.cluster,
        plugin = %config.connector_plugin_type,
        address = %config.server.address,
        port = config.server.port,
        transport = %config.server.transport,
        "meshd starting"
    );

    let registry = GroupRegistry::new(config, ConnectorCatalog::with_builtin());
    let names: Vec<String> = registry
        .config()
        .groups
        .iter()
        .map(|group| group.name.clone())
        .collect();
    for name in &names {
        let manager = registry
            .ensure_started(name)
            .await
            .with_context(|| format!("starting group `{name}`"))?;
        info!(%manager, client_id = %registry.client_id(name), "group ready");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    registry.shutdown_all().await;
    Ok(())
}
