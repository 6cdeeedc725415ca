//! # 紧凑线路对象
//!
//! ## 意图（Why）
//! - gRPC 前端使用扁平的单条消息与批量消息，字段显式、无模式校验；
//! - 这里只定义数据形状，编解码由传输层负责，转换逻辑见 [`crate::translate`]。
//!
//! ## 契约（What）
//! - 空串等价于“未设置”，与 protobuf 字符串字段的默认值语义一致；
//! - `properties` 以 `BTreeMap` 保存，序列化顺序稳定，便于逐字节比较。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::header::RequestHeader;

/// 单条紧凑消息。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleMessage {
    pub header: Option<RequestHeader>,
    pub producer_group: String,
    pub topic: String,
    pub content: String,
    pub ttl: String,
    pub seq_num: String,
    pub unique_id: String,
    pub tag: String,
    pub properties: BTreeMap<String, String>,
}

impl SimpleMessage {
    /// 是否为响应形态：序列号与唯一 ID 均缺失。
    pub fn is_response(&self) -> bool {
        self.seq_num.is_empty() && self.unique_id.is_empty()
    }
}

/// 批量消息中的单个条目。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageItem {
    pub content: String,
    pub ttl: String,
    pub seq_num: String,
    pub unique_id: String,
    pub tag: String,
    pub properties: BTreeMap<String, String>,
}

/// 共享请求头、生产组与主题的批量消息。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchMessage {
    pub header: Option<RequestHeader>,
    pub producer_group: String,
    pub topic: String,
    pub items: Vec<MessageItem>,
}
