//! # 运行时错误域
//!
//! ## 意图（Why）
//! - 以五类粗粒度错误覆盖运行时全部失败路径：参数非法、转换失败、连接器运行时错误、请求超时、
//!   生命周期误用；
//! - 连接器错误只区分“无载荷”与“未分类”两个桶，更细的分类由连接器自身负责。
//!
//! ## 契约（What）
//! - 每个变体提供稳定错误码（[`MeshError::code`]），日志与告警以错误码聚合；
//! - [`ProtocolError`] 可经 `?` 自动转换为对应变体。

use std::time::Duration;

use mesh_protocol::{Envelope, ProtocolError};
use thiserror::Error;

use crate::group::LifecycleState;

/// 连接器运行时错误的两个粗粒度桶。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConnectorFailureKind {
    /// 失败时没有可用载荷。
    NoPayload,
    /// 载荷存在但失败原因无法进一步归类。
    Unclassified,
}

impl ConnectorFailureKind {
    /// 面向运维的默认解释。
    pub const fn explanation(self) -> &'static str {
        match self {
            ConnectorFailureKind::NoPayload => "data does not exist",
            ConnectorFailureKind::Unclassified => "unknown connector runtime exception",
        }
    }
}

/// 运行时错误。
///
/// # 教案式说明
/// - **意图 (Why)**：前端、组管理器与连接器共享同一错误类型，结果经 `Future` 恰好交付一次；
/// - **契约 (What)**：全部变体 `Clone + Send + Sync`，可被多个等待者复制；
/// - **风险 (Trade-offs)**：`detail` 以 `String` 保存，牺牲少量分配换取可读性。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MeshError {
    /// 缺失或畸形的必填字段，例如空批量、空主题、未知插件。
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// 载荷无法按声明的内容类型解析或序列化。
    #[error("translation failure for content type `{content_type}`: {detail}")]
    TranslationFailure {
        content_type: String,
        detail: String,
    },

    /// 连接器后端失败。
    #[error("connector runtime error ({}): {detail}", kind.explanation())]
    ConnectorRuntime {
        kind: ConnectorFailureKind,
        detail: String,
    },

    /// 请求-应答超过等待上限。
    #[error("request-reply timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// 在不满足状态前置条件时调用了操作。
    #[error("group `{group}` cannot {operation} while {state}")]
    LifecycleMisuse {
        group: String,
        operation: &'static str,
        state: LifecycleState,
    },
}

impl MeshError {
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        MeshError::InvalidArgument {
            detail: detail.into(),
        }
    }

    pub fn connector(kind: ConnectorFailureKind, detail: impl Into<String>) -> Self {
        MeshError::ConnectorRuntime {
            kind,
            detail: detail.into(),
        }
    }

    /// 把连接器侧失败归入两个桶之一：信封缺失或载荷为空记为 `NoPayload`，其余为 `Unclassified`。
    pub fn classify(envelope: Option<&Envelope>, detail: impl Into<String>) -> Self {
        let kind = match envelope {
            Some(envelope) if envelope.has_payload() => ConnectorFailureKind::Unclassified,
            _ => ConnectorFailureKind::NoPayload,
        };
        MeshError::connector(kind, detail)
    }

    pub fn lifecycle(group: &str, operation: &'static str, state: LifecycleState) -> Self {
        MeshError::LifecycleMisuse {
            group: group.to_owned(),
            operation,
            state,
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            MeshError::InvalidArgument { .. } => "mesh.invalid_argument",
            MeshError::TranslationFailure { .. } => "mesh.translation_failure",
            MeshError::ConnectorRuntime { .. } => "mesh.connector.runtime",
            MeshError::Timeout { .. } => "mesh.request.timeout",
            MeshError::LifecycleMisuse { .. } => "mesh.lifecycle.misuse",
        }
    }
}

impl From<ProtocolError> for MeshError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidArgument { detail } => MeshError::InvalidArgument { detail },
            ProtocolError::TranslationFailure {
                content_type,
                detail,
            } => MeshError::TranslationFailure {
                content_type,
                detail,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_payload_presence() {
        let full = Envelope::new("t", "body");
        let empty = Envelope::new("t", "");
        assert!(matches!(
            MeshError::classify(Some(&full), "x"),
            MeshError::ConnectorRuntime { kind: ConnectorFailureKind::Unclassified, .. }
        ));
        assert!(matches!(
            MeshError::classify(Some(&empty), "x"),
            MeshError::ConnectorRuntime { kind: ConnectorFailureKind::NoPayload, .. }
        ));
        assert!(matches!(
            MeshError::classify(None, "x"),
            MeshError::ConnectorRuntime { kind: ConnectorFailureKind::NoPayload, .. }
        ));
    }

    #[test]
    fn protocol_errors_keep_their_bucket() {
        let err: MeshError = ProtocolError::translation("application/json", "bad").into();
        assert_eq!(err.code(), "mesh.translation_failure");
        let err: MeshError = ProtocolError::invalid_argument("empty").into();
        assert_eq!(err.code(), "mesh.invalid_argument");
    }

    #[test]
    fn display_mentions_bucket_explanation() {
        let err = MeshError::connector(ConnectorFailureKind::NoPayload, "broker gone");
        assert_eq!(
            err.to_string(),
            "connector runtime error (data does not exist): broker gone"
        );
        let err = MeshError::lifecycle("g1", "send", LifecycleState::Initialized);
        assert_eq!(err.to_string(), "group `g1` cannot send while initialized");
    }
}
