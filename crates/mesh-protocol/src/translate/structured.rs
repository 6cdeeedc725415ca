//! 结构化事件族（CloudEvents）的双向映射。
//!
//! - 入站：按 `contenttype` 属性解析事件格式，反序列化后把 `id`/`subject`/数据映射到信封字段，
//!   `source`/`type`/`specversion`/`time`/`dataschema` 写入同名扩展键，`seqnum`/`uniqueid`/`ttl`
//!   从保留扩展键读取，缺失时伪造；
//! - 出站：逆向构造事件，把序列号、唯一 ID、TTL 写回保留扩展键，其余扩展原样复制，
//!   再按信封记录的格式内容类型序列化（缺省为 CloudEvents JSON）。
//!
//! 线路属性与事件共同承载扩展：除上下文属性外的全部扩展都写入属性，其中不能作为事件扩展的
//! 名称（`id`、`data`、保留键等）只出现在属性里。入站时事件内的值优先，属性只补缺。

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::{
    cloudevents::{CloudEvent, SpecVersion, is_context_member, resolve_format},
    constants,
    envelope::Envelope,
    error::ProtocolError,
    ids,
};

use super::{WireFields, WireView, first_non_empty};

/// 线路侧对事件字段的覆盖值，HTTP 直连路径下全部为空。
#[derive(Default)]
struct Overrides<'a> {
    topic: &'a str,
    seq_num: &'a str,
    unique_id: &'a str,
    ttl: &'a str,
}

/// HTTP 前端：结构化事件 → 信封。
///
/// 主题取事件的 `subject`，缺失时返回 [`ProtocolError::InvalidArgument`]。
pub fn event_to_envelope(event: CloudEvent) -> Result<Envelope, ProtocolError> {
    map_event(event, &Overrides::default())
}

/// HTTP 前端：信封 → 结构化事件。
///
/// 与上下文属性、数据成员或保留键同名的扩展无法放进事件，在此路径上被略过。
pub fn envelope_to_event(envelope: &Envelope) -> CloudEvent {
    let ext = &envelope.extensions;
    let attr = |key: &str| ext.get(key).map(String::as_str).filter(|v| !v.is_empty());

    let spec_version = attr(constants::ATTR_SPEC_VERSION)
        .and_then(|v| v.parse::<SpecVersion>().ok())
        .unwrap_or(SpecVersion::LATEST);
    let id = if envelope.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        envelope.id.clone()
    };

    let mut event = CloudEvent::new(
        id,
        attr(constants::ATTR_SOURCE).unwrap_or(constants::DEFAULT_SOURCE),
        attr(constants::ATTR_TYPE).unwrap_or(constants::DEFAULT_EVENT_TYPE),
    )
    .with_spec_version(spec_version)
    .with_subject(envelope.topic.clone());
    if let Some(time) = attr(constants::ATTR_TIME) {
        event = event.with_time(time);
    }
    if let Some(schema) = attr(constants::ATTR_DATA_SCHEMA) {
        event = event.with_data_schema(schema);
    }

    let content_type = Some(envelope.content_type.clone()).filter(|ct| !ct.is_empty());
    if envelope.has_payload() {
        event = event.with_data(content_type, envelope.content.clone());
    } else if let Some(content_type) = content_type {
        event = event.with_data_content_type(content_type);
    }

    for (key, value) in ext.iter().filter(|(key, _)| rides_in_event(key)) {
        event = event.with_extension(key.as_str(), value.clone());
    }

    event
        .with_extension(constants::SEQ_NUM, ids::or_fabricate(&envelope.sequence_number))
        .with_extension(constants::UNIQUE_ID, ids::or_fabricate(&envelope.unique_id))
        .with_extension(
            constants::TTL,
            first_non_empty([Some(envelope.time_to_live.as_str())]).unwrap_or(constants::DEFAULT_TTL),
        )
}

pub(super) fn decode(view: &WireView<'_>) -> Result<Envelope, ProtocolError> {
    let format_type = first_non_empty([view.properties.get(constants::CONTENT_TYPE).map(String::as_str)])
        .unwrap_or(constants::CONTENT_TYPE_CLOUDEVENTS_JSON);
    let format = resolve_format(format_type).ok_or_else(|| {
        ProtocolError::translation(format_type, "no structured event format for content type")
    })?;
    let event = format.deserialize(view.content.as_bytes())?;

    let mut envelope = map_event(
        event,
        &Overrides {
            topic: view.topic,
            seq_num: view.seq_num,
            unique_id: view.unique_id,
            ttl: view.ttl,
        },
    )?;
    for (key, value) in view.properties {
        envelope
            .extensions
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    envelope
        .extensions
        .entry(constants::CONTENT_TYPE.to_owned())
        .or_insert_with(|| format_type.to_owned());
    Ok(envelope)
}

pub(super) fn encode(envelope: &Envelope) -> Result<WireFields, ProtocolError> {
    let format_type = first_non_empty([envelope.extension(constants::CONTENT_TYPE)])
        .unwrap_or(constants::CONTENT_TYPE_CLOUDEVENTS_JSON);
    let format = resolve_format(format_type).ok_or_else(|| {
        ProtocolError::translation(format_type, "no structured event format for content type")
    })?;

    let event = envelope_to_event(envelope);
    let content = String::from_utf8(format.serialize(&event)?)
        .map_err(|err| ProtocolError::translation(format_type, err.to_string()))?;

    let reserved = |key: &str| event.extension(key).unwrap_or_default().to_owned();
    let mut properties: BTreeMap<String, String> = envelope
        .extensions
        .iter()
        .filter(|(key, _)| !constants::ATTRIBUTE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    properties
        .entry(constants::CONTENT_TYPE.to_owned())
        .or_insert_with(|| format_type.to_owned());

    Ok(WireFields {
        content,
        ttl: reserved(constants::TTL),
        seq_num: reserved(constants::SEQ_NUM),
        unique_id: reserved(constants::UNIQUE_ID),
        properties,
    })
}

fn map_event(event: CloudEvent, overrides: &Overrides<'_>) -> Result<Envelope, ProtocolError> {
    let topic = first_non_empty([Some(overrides.topic), event.subject()])
        .ok_or_else(|| ProtocolError::invalid_argument("structured event carries no subject/topic"))?
        .to_owned();
    let sequence_number = ids::or_fabricate(
        first_non_empty([Some(overrides.seq_num), event.extension(constants::SEQ_NUM)]).unwrap_or_default(),
    );
    let unique_id = ids::or_fabricate(
        first_non_empty([Some(overrides.unique_id), event.extension(constants::UNIQUE_ID)]).unwrap_or_default(),
    );
    let time_to_live = first_non_empty([Some(overrides.ttl), event.extension(constants::TTL)])
        .unwrap_or(constants::DEFAULT_TTL)
        .to_owned();

    let mut extensions = BTreeMap::new();
    extensions.insert(constants::ATTR_SOURCE.to_owned(), event.source().to_owned());
    extensions.insert(constants::ATTR_TYPE.to_owned(), event.ty().to_owned());
    extensions.insert(
        constants::ATTR_SPEC_VERSION.to_owned(),
        event.spec_version().as_str().to_owned(),
    );
    if let Some(time) = event.time() {
        extensions.insert(constants::ATTR_TIME.to_owned(), time.to_owned());
    }
    if let Some(schema) = event.data_schema() {
        extensions.insert(constants::ATTR_DATA_SCHEMA.to_owned(), schema.to_owned());
    }
    for (key, value) in event.extensions() {
        if rides_in_event(key) {
            extensions.insert(key.clone(), value.clone());
        }
    }

    let id = if event.id().is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        event.id().to_owned()
    };

    Ok(Envelope {
        id,
        topic,
        content: event.data().cloned().unwrap_or_else(Bytes::new),
        content_type: event.data_content_type().unwrap_or_default().to_owned(),
        sequence_number,
        unique_id,
        time_to_live,
        extensions,
        header: None,
    })
}

/// 扩展能否作为事件扩展出现在结构化 JSON 中。
fn rides_in_event(key: &str) -> bool {
    !is_context_member(key)
        && !constants::RESERVED_EXTENSION_KEYS.contains(&key)
        && key != constants::CONTENT_TYPE
}
