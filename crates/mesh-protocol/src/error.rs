//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 转换器只会以两种方式失败：输入缺失必需字段，或载荷无法按声明的内容类型解析；
//! - 错误原样返回给协议前端，绝不以部分数据替代。
//!
//! ## 设计要求（What）
//! - 所有变体派生 `thiserror::Error`，携带可读上下文；
//! - [`ProtocolError::code`] 返回稳定的点分错误码，供前端映射为线路状态码。

use thiserror::Error;

/// 协议转换错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“调用方用法错误”与“载荷本身损坏”，前者通常可由调用方修正，后者需要排查生产者；
/// - **契约 (What)**：变体均为 `Clone + Send + Sync + 'static`，可安全跨线程传播；
/// - **设计权衡 (Trade-offs)**：以 `String` 保存上下文，牺牲少量分配换取易读的诊断信息。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProtocolError {
    /// 必需字段缺失或格式非法，例如空主题、空批量。
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// 载荷无法在声明的内容类型下反序列化，或内容类型无法解析为已知格式。
    #[error("translation failure for content type `{content_type}`: {detail}")]
    TranslationFailure {
        content_type: String,
        detail: String,
    },
}

impl ProtocolError {
    /// 构造 [`ProtocolError::InvalidArgument`]。
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        ProtocolError::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// 构造 [`ProtocolError::TranslationFailure`]。
    pub fn translation(content_type: impl Into<String>, detail: impl Into<String>) -> Self {
        ProtocolError::TranslationFailure {
            content_type: content_type.into(),
            detail: detail.into(),
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::InvalidArgument { .. } => "mesh.protocol.invalid_argument",
            ProtocolError::TranslationFailure { .. } => "mesh.protocol.translation_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ProtocolError::invalid_argument("x").code(),
            "mesh.protocol.invalid_argument"
        );
        let err = ProtocolError::translation("application/xml", "no format");
        assert_eq!(err.code(), "mesh.protocol.translation_failure");
        assert_eq!(
            err.to_string(),
            "translation failure for content type `application/xml`: no format"
        );
    }
}
