//! 紧凑消息族：内容按不透明文本搬运，属性即扩展。
//!
//! 线路上没有独立的内容类型字段，信封的 `content_type` 经 `contenttype` 属性往返；
//! 信封 `id` 在入站时取唯一 ID。属性整体原样进入扩展（包括 `seqnum`、`ttl` 等保留名），
//! 出站时扩展原样写回；只有信封带有非默认内容类型且扩展里没有 `contenttype` 时才补写该属性。

use bytes::Bytes;

use crate::{constants, envelope::Envelope, error::ProtocolError, ids};

use super::{WireFields, WireView, first_non_empty};

pub(super) fn decode(view: &WireView<'_>) -> Result<Envelope, ProtocolError> {
    if view.topic.is_empty() {
        return Err(ProtocolError::invalid_argument(
            "compact message topic is required and must be non-empty",
        ));
    }

    let property = |key: &str| view.properties.get(key).map(String::as_str);
    let time_to_live = first_non_empty([Some(view.ttl), property(constants::TTL)])
        .unwrap_or(constants::DEFAULT_TTL)
        .to_owned();
    let content_type = first_non_empty([property(constants::CONTENT_TYPE)])
        .unwrap_or(constants::CONTENT_TYPE_TEXT)
        .to_owned();
    let unique_id = ids::or_fabricate(view.unique_id);

    Ok(Envelope {
        id: unique_id.clone(),
        topic: view.topic.to_owned(),
        content: Bytes::copy_from_slice(view.content.as_bytes()),
        content_type,
        sequence_number: ids::or_fabricate(view.seq_num),
        unique_id,
        time_to_live,
        extensions: view.properties.clone(),
        header: None,
    })
}

pub(super) fn encode(envelope: &Envelope) -> Result<WireFields, ProtocolError> {
    let content = envelope
        .content_str()
        .ok_or_else(|| {
            ProtocolError::translation(
                envelope.content_type.as_str(),
                "compact message content must be valid UTF-8",
            )
        })?
        .to_owned();
    let ttl = first_non_empty([Some(envelope.time_to_live.as_str())])
        .unwrap_or(constants::DEFAULT_TTL)
        .to_owned();

    let mut properties = envelope.extensions.clone();
    if let Some(content_type) = first_non_empty([Some(envelope.content_type.as_str())])
        .filter(|content_type| *content_type != constants::CONTENT_TYPE_TEXT)
    {
        properties
            .entry(constants::CONTENT_TYPE.to_owned())
            .or_insert_with(|| content_type.to_owned());
    }

    Ok(WireFields {
        content,
        ttl,
        seq_num: ids::or_fabricate(&envelope.sequence_number),
        unique_id: ids::or_fabricate(&envelope.unique_id),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn view<'a>(properties: &'a BTreeMap<String, String>, seq: &'a str) -> WireView<'a> {
        WireView {
            topic: "orders",
            content: "hello",
            ttl: "",
            seq_num: seq,
            unique_id: "",
            properties,
        }
    }

    #[test]
    fn ttl_falls_back_to_property_then_default() {
        let mut properties = BTreeMap::new();
        let envelope = decode(&view(&properties, "1")).expect("decode");
        assert_eq!(envelope.time_to_live, constants::DEFAULT_TTL);

        properties.insert(constants::TTL.to_owned(), "9000".to_owned());
        let envelope = decode(&view(&properties, "1")).expect("decode");
        assert_eq!(envelope.time_to_live, "9000");
        assert_eq!(envelope.extension(constants::TTL), Some("9000"));
    }

    #[test]
    fn missing_unique_id_is_fabricated_and_used_as_id() {
        let properties = BTreeMap::new();
        let envelope = decode(&view(&properties, "1")).expect("decode");
        assert!(ids::is_fabricated_shape(&envelope.unique_id));
        assert_eq!(envelope.id, envelope.unique_id);
        assert_eq!(envelope.sequence_number, "1");
        assert_eq!(envelope.content_type, constants::CONTENT_TYPE_TEXT);
    }

    #[test]
    fn empty_topic_is_rejected() {
        let properties = BTreeMap::new();
        let mut view = view(&properties, "1");
        view.topic = "";
        assert!(matches!(decode(&view), Err(ProtocolError::InvalidArgument { .. })));
    }

    #[test]
    fn binary_content_cannot_ride_the_compact_family() {
        let envelope = Envelope::new("orders", vec![0xff, 0xfe]);
        assert!(matches!(
            encode(&envelope),
            Err(ProtocolError::TranslationFailure { .. })
        ));
    }

    #[test]
    fn content_type_survives_through_properties() {
        let envelope = Envelope::new("orders", "{}")
            .with_content_type("application/json")
            .with_extension("region", "eu");
        let fields = encode(&envelope).expect("encode");
        assert_eq!(
            fields.properties.get(constants::CONTENT_TYPE).map(String::as_str),
            Some("application/json")
        );

        let view = WireView {
            topic: "orders",
            content: &fields.content,
            ttl: &fields.ttl,
            seq_num: &fields.seq_num,
            unique_id: &fields.unique_id,
            properties: &fields.properties,
        };
        let decoded = decode(&view).expect("decode");
        assert_eq!(decoded.content_type, "application/json");
        assert_eq!(decoded.extension("region"), Some("eu"));
        assert_eq!(decoded.unique_id, envelope.unique_id);
    }

    #[test]
    fn reserved_named_properties_survive_the_round_trip() {
        let properties = BTreeMap::from([
            ("region".to_owned(), "eu".to_owned()),
            (constants::SEQ_NUM.to_owned(), "biz-key".to_owned()),
        ]);
        let envelope = decode(&view(&properties, "1")).expect("decode");
        assert_eq!(envelope.sequence_number, "1");
        assert_eq!(envelope.extension(constants::SEQ_NUM), Some("biz-key"));

        let fields = encode(&envelope).expect("encode");
        assert_eq!(fields.seq_num, "1");
        assert_eq!(fields.properties, properties);
    }

    #[test]
    fn explicit_contenttype_extension_wins_over_field() {
        let envelope = Envelope::new("orders", "{}")
            .with_content_type("application/json")
            .with_extension(constants::CONTENT_TYPE, "text/csv");
        let fields = encode(&envelope).expect("encode");
        assert_eq!(
            fields.properties.get(constants::CONTENT_TYPE).map(String::as_str),
            Some("text/csv")
        );
    }
}
