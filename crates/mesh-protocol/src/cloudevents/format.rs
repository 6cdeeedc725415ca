use base64::Engine as _;
use serde_json::{Map, Value};

use crate::{
    constants::{self, ATTR_DATA_CONTENT_TYPE, ATTR_ID, ATTR_SUBJECT, DATA, DATA_BASE64},
    error::ProtocolError,
};

use super::{CloudEvent, SpecVersion};

/// 结构化事件格式。
///
/// # 教案式说明
/// - **意图 (Why)**：按内容类型选择序列化方式，使结构化事件族不绑定某一具体编码；
/// - **契约 (What)**：实现必须是无状态的 `Send + Sync`，同一事件多次序列化结果逐字节一致；
///   反序列化失败返回 [`ProtocolError::TranslationFailure`]。
pub trait EventFormat: Send + Sync + 'static {
    /// 本格式的规范内容类型。
    fn content_type(&self) -> &'static str;

    /// 判断是否能处理给定内容类型（已去除参数并转为小写）。
    fn accepts(&self, content_type: &str) -> bool;

    fn serialize(&self, event: &CloudEvent) -> Result<Vec<u8>, ProtocolError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<CloudEvent, ProtocolError>;
}

/// CloudEvents JSON 结构化格式。
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

static JSON_FORMAT: JsonFormat = JsonFormat;

/// 按内容类型解析结构化格式。
///
/// 媒体类型参数（如 `; charset=utf-8`）与大小写不参与匹配；未知类型返回 `None`。
pub fn resolve_format(content_type: &str) -> Option<&'static dyn EventFormat> {
    let normalized = normalize(content_type);
    if JSON_FORMAT.accepts(&normalized) {
        Some(&JSON_FORMAT)
    } else {
        None
    }
}

fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// 数据类型是否按 JSON 值内联。未声明类型时按 JSON 处理。
fn is_json_data(content_type: Option<&str>) -> bool {
    match content_type.map(normalize) {
        None => true,
        Some(ct) => ct == constants::CONTENT_TYPE_JSON || ct == "text/json" || ct.ends_with("+json"),
    }
}

impl EventFormat for JsonFormat {
    fn content_type(&self) -> &'static str {
        constants::CONTENT_TYPE_CLOUDEVENTS_JSON
    }

    fn accepts(&self, content_type: &str) -> bool {
        content_type == constants::CONTENT_TYPE_CLOUDEVENTS_JSON
            || content_type == constants::CONTENT_TYPE_JSON
    }

    fn serialize(&self, event: &CloudEvent) -> Result<Vec<u8>, ProtocolError> {
        let mut object = Map::new();
        put(&mut object, constants::ATTR_SPEC_VERSION, event.spec_version().as_str());
        put(&mut object, ATTR_ID, event.id());
        put(&mut object, constants::ATTR_SOURCE, event.source());
        put(&mut object, constants::ATTR_TYPE, event.ty());
        if let Some(subject) = event.subject() {
            put(&mut object, ATTR_SUBJECT, subject);
        }
        if let Some(content_type) = event.data_content_type() {
            put(&mut object, ATTR_DATA_CONTENT_TYPE, content_type);
        }
        if let Some(schema) = event.data_schema() {
            put(&mut object, constants::ATTR_DATA_SCHEMA, schema);
        }
        if let Some(time) = event.time() {
            put(&mut object, constants::ATTR_TIME, time);
        }

        for (name, value) in event.extensions() {
            if is_context_member(name) {
                return Err(ProtocolError::translation(
                    self.content_type(),
                    format!("extension `{name}` collides with a context attribute"),
                ));
            }
            put(&mut object, name, value);
        }

        if let Some(data) = event.data() {
            let inline = if is_json_data(event.data_content_type()) {
                serde_json::from_slice::<Value>(data)
                    .ok()
                    .filter(|value| !value.is_string())
            } else {
                None
            };
            match inline {
                Some(value) => {
                    object.insert(DATA.to_owned(), value);
                }
                None => match std::str::from_utf8(data) {
                    Ok(text) => put(&mut object, DATA, text),
                    Err(_) => put(
                        &mut object,
                        DATA_BASE64,
                        &base64::engine::general_purpose::STANDARD.encode(data),
                    ),
                },
            }
        }

        serde_json::to_vec(&Value::Object(object))
            .map_err(|err| ProtocolError::translation(self.content_type(), err.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CloudEvent, ProtocolError> {
        let fail = |detail: String| ProtocolError::translation(self.content_type(), detail);

        let value: Value = serde_json::from_slice(bytes).map_err(|err| fail(err.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(fail("structured event must be a JSON object".to_owned()));
        };

        let spec_version: SpecVersion = take_required(&mut object, constants::ATTR_SPEC_VERSION)
            .map_err(&fail)?
            .parse()
            .map_err(&fail)?;
        let id = take_required(&mut object, ATTR_ID).map_err(&fail)?;
        let source = take_required(&mut object, constants::ATTR_SOURCE).map_err(&fail)?;
        let ty = take_required(&mut object, constants::ATTR_TYPE).map_err(&fail)?;

        let mut event = CloudEvent::new(id, source, ty).with_spec_version(spec_version);
        if let Some(subject) = take_optional(&mut object, ATTR_SUBJECT).map_err(&fail)? {
            event = event.with_subject(subject);
        }
        let data_content_type =
            take_optional(&mut object, ATTR_DATA_CONTENT_TYPE).map_err(&fail)?;
        if let Some(schema) = take_optional(&mut object, constants::ATTR_DATA_SCHEMA).map_err(&fail)? {
            event = event.with_data_schema(schema);
        }
        if let Some(time) = take_optional(&mut object, constants::ATTR_TIME).map_err(&fail)? {
            event = event.with_time(time);
        }

        let data = match (object.remove(DATA_BASE64), object.remove(DATA)) {
            (Some(Value::String(encoded)), _) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|err| fail(format!("invalid data_base64: {err}")))?,
            ),
            (Some(_), _) => return Err(fail("data_base64 must be a string".to_owned())),
            (None, Some(Value::String(text))) => Some(text.into_bytes()),
            (None, Some(Value::Null)) | (None, None) => None,
            (None, Some(value)) => {
                Some(serde_json::to_vec(&value).map_err(|err| fail(err.to_string()))?)
            }
        };
        match data {
            Some(data) => event = event.with_data(data_content_type, data),
            None => {
                if let Some(content_type) = data_content_type {
                    event = event.with_data_content_type(content_type);
                }
            }
        }

        for (name, value) in object {
            let value = match value {
                Value::Null => continue,
                Value::String(text) => text,
                other => other.to_string(),
            };
            event = event.with_extension(name, value);
        }
        Ok(event)
    }
}

/// 名称是否已被上下文属性或数据成员占用，不能作为扩展写入结构化 JSON。
pub(crate) fn is_context_member(name: &str) -> bool {
    constants::EVENT_MEMBER_KEYS.contains(&name) || constants::ATTRIBUTE_KEYS.contains(&name)
}

fn put(object: &mut Map<String, Value>, key: &str, value: &str) {
    object.insert(key.to_owned(), Value::String(value.to_owned()));
}

fn take_required(object: &mut Map<String, Value>, key: &str) -> Result<String, String> {
    take_optional(object, key)?.ok_or_else(|| format!("missing required attribute `{key}`"))
}

fn take_optional(object: &mut Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(format!("attribute `{key}` must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_json_ignoring_parameters() {
        assert!(resolve_format("application/cloudevents+json; charset=utf-8").is_some());
        assert!(resolve_format("Application/JSON").is_some());
        assert!(resolve_format("application/cloudevents+protobuf").is_none());
    }

    #[test]
    fn json_object_data_is_inlined() {
        let event = CloudEvent::new("1", "/src", "demo")
            .with_data(Some("application/json".into()), br#"{"a": 1}"#.to_vec());
        let bytes = JsonFormat.serialize(&event).expect("serialize");
        let text = String::from_utf8(bytes.clone()).expect("utf8");
        assert!(text.contains(r#""data":{"a":1}"#), "{text}");

        let decoded = JsonFormat.deserialize(&bytes).expect("deserialize");
        assert_eq!(decoded.data().map(|d| d.to_vec()), Some(br#"{"a":1}"#.to_vec()));
    }

    #[test]
    fn binary_data_uses_base64() {
        let event = CloudEvent::new("1", "/src", "demo")
            .with_data(Some("application/octet-stream".into()), vec![0xff, 0x00, 0x10]);
        let bytes = JsonFormat.serialize(&event).expect("serialize");
        let decoded = JsonFormat.deserialize(&bytes).expect("deserialize");
        assert_eq!(decoded, event);
    }

    #[test]
    fn quoted_json_string_survives() {
        let event = CloudEvent::new("1", "/src", "demo")
            .with_data(Some("application/json".into()), br#""hello""#.to_vec());
        let decoded = JsonFormat
            .deserialize(&JsonFormat.serialize(&event).expect("serialize"))
            .expect("deserialize");
        assert_eq!(decoded, event);
    }

    #[test]
    fn non_string_extensions_are_stringified() {
        let raw = br#"{"specversion":"1.0","id":"1","source":"/s","type":"t","count":3,"flag":true}"#;
        let event = JsonFormat.deserialize(raw).expect("deserialize");
        assert_eq!(event.extension("count"), Some("3"));
        assert_eq!(event.extension("flag"), Some("true"));
    }

    #[test]
    fn missing_required_attribute_fails() {
        let raw = br#"{"specversion":"1.0","id":"1","type":"t"}"#;
        let err = JsonFormat.deserialize(raw).expect_err("source is required");
        assert!(matches!(err, ProtocolError::TranslationFailure { .. }));
    }

    #[test]
    fn colliding_extension_is_rejected() {
        let event = CloudEvent::new("1", "/s", "t").with_extension("id", "2");
        assert!(JsonFormat.serialize(&event).is_err());

        // 事件未设置 subject 时，同名扩展同样会在反序列化时被误读为属性。
        let event = CloudEvent::new("1", "/s", "t").with_extension("subject", "s");
        assert!(JsonFormat.serialize(&event).is_err());
    }
}
