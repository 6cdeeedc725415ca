//! # 规范化信封
//!
//! ## 核心意图（Why）
//! - 所有协议族的转换器都产出/消费同一种内存表示，生产/消费组与连接器只需理解它；
//! - 线路格式中无法显式建模的元数据全部落入 `extensions`，保证往返无损。
//!
//! ## 字段契约（What）
//! - `id`：不透明标识，缺省时以 UUID v4 生成；
//! - `topic`：目的主题，必填且非空；
//! - `content` + `content_type`：原始载荷字节及其类型；
//! - `sequence_number` / `unique_id`：缺省时伪造为 30 位数字串（见 [`crate::ids`]），**不是**真实序列；
//! - `time_to_live`：字符串形式的毫秒数，缺省为 [`DEFAULT_TTL`](crate::constants::DEFAULT_TTL)；
//! - `extensions`：键唯一、与顺序无关的字符串映射；
//! - `header`：入站时附带的请求头，按逻辑请求共享，不参与持久化。

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;

use crate::{constants, header::RequestHeader, ids};

/// 协议无关的事件信封。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub id: String,
    pub topic: String,
    pub content: Bytes,
    pub content_type: String,
    pub sequence_number: String,
    pub unique_id: String,
    pub time_to_live: String,
    pub extensions: BTreeMap<String, String>,
    pub header: Option<Arc<RequestHeader>>,
}

impl Envelope {
    /// 以主题与载荷构造信封，其余字段取默认或伪造值。
    ///
    /// # 教案式注释
    /// - **后置条件**：`id` 为新 UUID，`sequence_number`/`unique_id` 为新伪造值，
    ///   `time_to_live` 为默认 TTL，`content_type` 为 `text/plain`，扩展为空。
    pub fn new(topic: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            content: content.into(),
            content_type: constants::CONTENT_TYPE_TEXT.to_owned(),
            sequence_number: ids::fabricate_id(),
            unique_id: ids::fabricate_id(),
            time_to_live: constants::DEFAULT_TTL.to_owned(),
            extensions: BTreeMap::new(),
            header: None,
        }
    }

    /// 替换内容类型。
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// 显式指定业务序列号。
    pub fn with_sequence_number(mut self, sequence_number: impl Into<String>) -> Self {
        self.sequence_number = sequence_number.into();
        self
    }

    /// 显式指定投递去重键。
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    /// 显式指定 TTL。
    pub fn with_time_to_live(mut self, ttl: impl Into<String>) -> Self {
        self.time_to_live = ttl.into();
        self
    }

    /// 追加或覆盖一个扩展键。
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// 附着请求头。
    pub fn with_header(mut self, header: Arc<RequestHeader>) -> Self {
        self.header = Some(header);
        self
    }

    /// 读取扩展值。
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    /// 载荷是否为空。连接器据此对失败进行粗粒度归类。
    pub fn has_payload(&self) -> bool {
        !self.content.is_empty()
    }

    /// 载荷的 UTF-8 视图。
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}
