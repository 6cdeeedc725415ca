//! # CloudEvents 事件模型
//!
//! ## 意图（Why）
//! - HTTP 前端与 gRPC 的 `cloudevents` 协议族都以结构化事件为载体，需要一个与具体格式解耦的值类型；
//! - 格式（JSON 等）通过 [`EventFormat`] 插拔，按内容类型解析。
//!
//! ## 契约（What）
//! - `id`/`source`/`type` 为必填上下文属性，其余属性可缺省；
//! - 扩展值统一以字符串保存，时间属性按原文保存，不做解析，保证往返逐字节一致。

mod format;

use std::{collections::BTreeMap, fmt, str::FromStr};

use bytes::Bytes;

pub use format::{EventFormat, JsonFormat, resolve_format};
pub(crate) use format::is_context_member;

/// CloudEvents 规范版本。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SpecVersion {
    V03,
    #[default]
    V1,
}

impl SpecVersion {
    /// 当前支持的最新规范版本。
    pub const LATEST: SpecVersion = SpecVersion::V1;

    /// 规范版本的线路字面量。
    pub const fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V03 => "0.3",
            SpecVersion::V1 => "1.0",
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "0.3" => Ok(SpecVersion::V03),
            "1.0" => Ok(SpecVersion::V1),
            other => Err(format!("unsupported specversion `{other}`")),
        }
    }
}

/// 结构化事件。
///
/// # 教案式说明
/// - **意图 (Why)**：作为 CloudEvents 协议族的中间表示，转换器先将线路字节反序列化为它，再映射到信封；
/// - **契约 (What)**：构造后通过 `with_*` 方法补充可选属性；扩展以 `BTreeMap` 保存，序列化顺序确定；
/// - **风险 (Trade-offs)**：扩展值丢失了 CloudEvents 的整数/布尔类型区分，统一视为字符串。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CloudEvent {
    spec_version: SpecVersion,
    id: String,
    source: String,
    ty: String,
    subject: Option<String>,
    data_content_type: Option<String>,
    data_schema: Option<String>,
    time: Option<String>,
    data: Option<Bytes>,
    extensions: BTreeMap<String, String>,
}

impl CloudEvent {
    /// 以必填属性构造事件，规范版本取最新。
    pub fn new(id: impl Into<String>, source: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            spec_version: SpecVersion::LATEST,
            id: id.into(),
            source: source.into(),
            ty: ty.into(),
            subject: None,
            data_content_type: None,
            data_schema: None,
            time: None,
            data: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_spec_version(mut self, spec_version: SpecVersion) -> Self {
        self.spec_version = spec_version;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_data_schema(mut self, schema: impl Into<String>) -> Self {
        self.data_schema = Some(schema.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// 设置数据与其内容类型；`content_type` 为 `None` 时保持数据类型未声明。
    pub fn with_data(mut self, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        self.data_content_type = content_type;
        self.data = Some(data.into());
        self
    }

    /// 仅声明数据类型而不携带数据。
    pub fn with_data_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.data_content_type = Some(content_type.into());
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.spec_version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn data_content_type(&self) -> Option<&str> {
        self.data_content_type.as_deref()
    }

    pub fn data_schema(&self) -> Option<&str> {
        self.data_schema.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name).map(String::as_str)
    }

    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }
}
