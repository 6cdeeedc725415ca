//! 日志初始化。
//!
//! - **意图 (Why)**：二进制入口与嵌入方共用一套 `fmt + EnvFilter` 组合，过滤规则优先读取 `RUST_LOG`；
//! - **契约 (What)**：每个进程只能安装一次，重复调用返回 [`TelemetryError::AlreadyInstalled`]，不会 panic；
//!   外部已设置全局 Subscriber 时返回 [`TelemetryError::SetGlobalSubscriber`]。

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("tracing subscriber is already installed")]
    AlreadyInstalled,
    #[error("failed to set the global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装全局 `tracing` Subscriber。`default_directive` 在 `RUST_LOG` 缺失或非法时生效，例如 `"info"`。
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(TelemetryError::AlreadyInstalled);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(default_directive))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_env_filter(default_directive: &str) -> EnvFilter {
    let configured = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    parse_filter(configured.as_deref(), default_directive)
}

/// 空白或无法解析的配置回退到默认指令。
fn parse_filter(configured: Option<&str>, default_directive: &str) -> EnvFilter {
    configured
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        // 只翻转安装标记，不触碰全局 Subscriber，以免干扰同进程内捕获日志的测试。
        INSTALLED.store(true, Ordering::SeqCst);
        assert!(matches!(
            init_tracing("debug"),
            Err(TelemetryError::AlreadyInstalled)
        ));
    }

    #[test]
    fn configured_directives_take_precedence() {
        assert_eq!(parse_filter(Some("warn"), "debug").to_string(), "warn");
    }

    #[test]
    fn missing_or_invalid_directives_fall_back_to_default() {
        assert_eq!(
            parse_filter(None, "mesh_runtime=debug").to_string(),
            "mesh_runtime=debug"
        );
        assert_eq!(parse_filter(Some("  "), "info").to_string(), "info");
        assert_eq!(parse_filter(Some("mesh_runtime=loud"), "info").to_string(), "info");
    }
}
