//! # 协议转换器
//!
//! ## 核心意图（Why）
//! - 把前端交来的线路对象归一为 [`Envelope`]，并在回程时还原为同一协议族的线路对象；
//! - 两个协议族共享同一套线路字段（主题、内容、TTL、序列号、唯一 ID、属性），差异只在
//!   内容的解释方式：结构化族把内容视为序列化的 CloudEvent，紧凑族视为不透明文本。
//!
//! ## 行为契约（What）
//! - [`to_envelope`]：入站。序列号与唯一 ID 同时缺失的消息视为响应，解码为扁平的字符串映射；
//! - [`to_simple_message`]：出站单条；
//! - [`to_batch_message`] / [`from_batch_message`]：批量出站/入站，空批量返回
//!   [`ProtocolError::InvalidArgument`]；
//! - 全部函数无共享状态，可并发调用。
//!
//! ## 往返不变量
//! 对任意带扩展的信封 `E`，同一协议族下
//! `to_wire(from_wire(to_wire(E))) == to_wire(E)`，且不会丢弃或重命名扩展键。

mod batch;
mod compact;
pub mod structured;

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    constants,
    envelope::Envelope,
    error::ProtocolError,
    header::RequestHeader,
    wire::{MessageItem, SimpleMessage},
};

pub use batch::{from_batch_message, to_batch_message};
pub use structured::{envelope_to_event, event_to_envelope};

/// 请求头声明的协议族。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProtocolFamily {
    /// CloudEvents 结构化事件族。
    CloudEvents,
    /// 字段显式的紧凑消息族。
    MeshMessage,
}

impl ProtocolFamily {
    /// 依据请求头中的 `protocol_type` 选择协议族；非 `cloudevents` 一律按紧凑族处理。
    pub fn from_protocol_type(protocol_type: &str) -> Self {
        if protocol_type.eq_ignore_ascii_case(constants::PROTOCOL_CLOUD_EVENTS) {
            ProtocolFamily::CloudEvents
        } else {
            ProtocolFamily::MeshMessage
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolFamily::CloudEvents => constants::PROTOCOL_CLOUD_EVENTS,
            ProtocolFamily::MeshMessage => constants::PROTOCOL_MESH_MESSAGE,
        }
    }
}

/// 入站转换结果。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Inbound {
    /// 普通消息。
    Envelope(Envelope),
    /// 响应形态的消息，内容被解释为扁平键值对。
    Response(BTreeMap<String, String>),
}

impl Inbound {
    /// 取出信封；响应形态返回 `None`。
    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            Inbound::Envelope(envelope) => Some(envelope),
            Inbound::Response(_) => None,
        }
    }
}

/// 出站转换所需的请求级上下文。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WireContext {
    pub header: RequestHeader,
    pub producer_group: String,
}

impl WireContext {
    pub fn new(header: RequestHeader, producer_group: impl Into<String>) -> Self {
        Self {
            header,
            producer_group: producer_group.into(),
        }
    }
}

/// 线路字段的只读视图，单条消息与批量条目共用。
pub(crate) struct WireView<'a> {
    pub topic: &'a str,
    pub content: &'a str,
    pub ttl: &'a str,
    pub seq_num: &'a str,
    pub unique_id: &'a str,
    pub properties: &'a BTreeMap<String, String>,
}

/// 出站时按协议族编码出的线路字段。
pub(crate) struct WireFields {
    pub content: String,
    pub ttl: String,
    pub seq_num: String,
    pub unique_id: String,
    pub properties: BTreeMap<String, String>,
}

impl From<WireFields> for MessageItem {
    fn from(fields: WireFields) -> Self {
        MessageItem {
            content: fields.content,
            ttl: fields.ttl,
            seq_num: fields.seq_num,
            unique_id: fields.unique_id,
            tag: String::new(),
            properties: fields.properties,
        }
    }
}

pub(crate) fn decode(family: ProtocolFamily, view: &WireView<'_>) -> Result<Envelope, ProtocolError> {
    match family {
        ProtocolFamily::CloudEvents => structured::decode(view),
        ProtocolFamily::MeshMessage => compact::decode(view),
    }
}

pub(crate) fn encode(family: ProtocolFamily, envelope: &Envelope) -> Result<WireFields, ProtocolError> {
    if envelope.topic.is_empty() {
        return Err(ProtocolError::invalid_argument(
            "envelope topic is required and must be non-empty",
        ));
    }
    match family {
        ProtocolFamily::CloudEvents => structured::encode(envelope),
        ProtocolFamily::MeshMessage => compact::encode(envelope),
    }
}

/// 入站：单条紧凑线路消息 → 信封或响应映射。
pub fn to_envelope(message: &SimpleMessage, family: ProtocolFamily) -> Result<Inbound, ProtocolError> {
    if message.is_response() {
        return decode_response(&message.content).map(Inbound::Response);
    }

    let view = WireView {
        topic: &message.topic,
        content: &message.content,
        ttl: &message.ttl,
        seq_num: &message.seq_num,
        unique_id: &message.unique_id,
        properties: &message.properties,
    };
    let mut envelope = decode(family, &view)?;
    envelope.header = message.header.clone().map(Arc::new);
    Ok(Inbound::Envelope(envelope))
}

/// 出站：信封 → 单条紧凑线路消息。
pub fn to_simple_message(
    envelope: &Envelope,
    context: &WireContext,
    family: ProtocolFamily,
) -> Result<SimpleMessage, ProtocolError> {
    let fields = encode(family, envelope)?;
    Ok(SimpleMessage {
        header: Some(context.header.clone()),
        producer_group: context.producer_group.clone(),
        topic: envelope.topic.clone(),
        content: fields.content,
        ttl: fields.ttl,
        seq_num: fields.seq_num,
        unique_id: fields.unique_id,
        tag: String::new(),
        properties: fields.properties,
    })
}

fn decode_response(content: &str) -> Result<BTreeMap<String, String>, ProtocolError> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(content).map_err(|err| {
        ProtocolError::translation(
            constants::CONTENT_TYPE_JSON,
            format!("response payload is not a flat string map: {err}"),
        )
    })
}

/// 取第一个非空候选值。
pub(crate) fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}
