//! # 线路保留字面量
//!
//! ## 意图（Why）
//! - 这些名称与各语言 SDK、连接器实现共享，属于线路契约的一部分，任何改动都会破坏跨语言互通；
//! - 集中声明避免转换器各自硬编码，出现拼写漂移。
//!
//! ## 契约（What）
//! - 所有常量均为 `&'static str`，可直接用作扩展键或属性键；
//! - [`RESERVED_EXTENSION_KEYS`] 列出由信封显式字段建模的键：结构化事件内的同名扩展入站时被剥离，
//!   线路属性中的同名键则作为普通扩展原样保留；
//! - [`EVENT_MEMBER_KEYS`] 列出结构化 JSON 中已被占用的成员名，同名信封扩展只经线路属性往返。

/// 结构化事件扩展中承载业务序列号的键。
pub const SEQ_NUM: &str = "seqnum";

/// 结构化事件扩展中承载投递去重键的键。
pub const UNIQUE_ID: &str = "uniqueid";

/// 消息存活时间的扩展键/属性键。
pub const TTL: &str = "ttl";

/// 紧凑消息属性中记录结构化格式内容类型的键。
pub const CONTENT_TYPE: &str = "contenttype";

/// 未显式声明 TTL 时使用的默认值（毫秒）。
pub const DEFAULT_TTL: &str = "4000";

/// 结构化 CloudEvents JSON 格式的内容类型。
pub const CONTENT_TYPE_CLOUDEVENTS_JSON: &str = "application/cloudevents+json";

/// 普通 JSON 数据的内容类型。
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// 紧凑消息族未声明内容类型时的默认值。
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// CloudEvents 协议族在请求头 `protocol_type` 中的名称。
pub const PROTOCOL_CLOUD_EVENTS: &str = "cloudevents";

/// 紧凑消息协议族在请求头 `protocol_type` 中的名称。
pub const PROTOCOL_MESH_MESSAGE: &str = "eventmeshmessage";

/// 信封扩展中保存 CloudEvents `source` 属性的键。
pub const ATTR_SOURCE: &str = "source";

/// 信封扩展中保存 CloudEvents `type` 属性的键。
pub const ATTR_TYPE: &str = "type";

/// 信封扩展中保存 CloudEvents `specversion` 属性的键。
pub const ATTR_SPEC_VERSION: &str = "specversion";

/// 信封扩展中保存 CloudEvents `time` 属性的键。
pub const ATTR_TIME: &str = "time";

/// 信封扩展中保存 CloudEvents `dataschema` 属性的键。
pub const ATTR_DATA_SCHEMA: &str = "dataschema";

/// CloudEvents `id` 属性在结构化 JSON 中的成员名。
pub const ATTR_ID: &str = "id";

/// CloudEvents `subject` 属性在结构化 JSON 中的成员名。
pub const ATTR_SUBJECT: &str = "subject";

/// CloudEvents `datacontenttype` 属性在结构化 JSON 中的成员名。
pub const ATTR_DATA_CONTENT_TYPE: &str = "datacontenttype";

/// 结构化 JSON 中承载文本或 JSON 数据的成员名。
pub const DATA: &str = "data";

/// 结构化 JSON 中承载二进制数据（Base64）的成员名。
pub const DATA_BASE64: &str = "data_base64";

/// 出站时未携带 `source` 的事件所使用的默认来源。
pub const DEFAULT_SOURCE: &str = "/";

/// 出站时未携带 `type` 的事件所使用的默认类型。
pub const DEFAULT_EVENT_TYPE: &str = "eventmesh.message";

/// 由信封显式字段建模的键，结构化事件内的同名扩展在入站时剥离。
pub const RESERVED_EXTENSION_KEYS: [&str; 3] = [SEQ_NUM, UNIQUE_ID, TTL];

/// 在信封扩展中代表 CloudEvents 上下文属性（而非扩展）的键。
pub const ATTRIBUTE_KEYS: [&str; 5] = [
    ATTR_SOURCE,
    ATTR_TYPE,
    ATTR_SPEC_VERSION,
    ATTR_TIME,
    ATTR_DATA_SCHEMA,
];

/// 结构化 JSON 中由信封字段或数据占用、不能作为事件扩展出现的成员名。
pub const EVENT_MEMBER_KEYS: [&str; 5] = [
    ATTR_ID,
    ATTR_SUBJECT,
    ATTR_DATA_CONTENT_TYPE,
    DATA,
    DATA_BASE64,
];
