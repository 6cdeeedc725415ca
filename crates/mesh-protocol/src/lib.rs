#![doc = r#"
# mesh-protocol

## 设计动机（Why）
- **定位**：为事件网格提供协议无关的规范化信封 [`Envelope`]，并实现 CloudEvents
  结构化事件族与紧凑消息族（含批量）到信封的双向转换。
- **架构角色**：HTTP/gRPC/TCP 前端在完成线路解码后调用本 crate，将线路对象归一为信封，
  再交给运行时的生产/消费组；回程时由同一组转换器还原线路格式。
- **设计理念**：转换器是纯函数，不持有共享可变状态，天然 `Send + Sync`，可被任意工作线程并发调用。

## 核心契约（What）
- 对良构输入转换是全函数，不会 panic；失败以 [`ProtocolError`] 返回给前端；
- 入站缺失的 `sequence_number`/`unique_id` 会被填充为 30 位随机数字串，详见 [`ids`]；
- 同一协议族内，入站出现的每个扩展键都会在出站时原样出现（往返不变量）。

## 风险与考量（Trade-offs）
- 伪造的序列号/唯一 ID 仅为尽力而为的近似值，不具备密码学安全性，也不保证全局唯一；
- JSON 结构化格式会规整化 JSON 数据的空白字符，因此往返在第一次出站后才是逐字节幂等的。
"#]

pub mod cloudevents;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod header;
pub mod ids;
pub mod translate;
pub mod wire;

pub use cloudevents::{CloudEvent, EventFormat, JsonFormat, SpecVersion, resolve_format};
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use header::{ClientIdentity, RequestHeader, Transport};
pub use translate::{Inbound, ProtocolFamily, WireContext};
pub use wire::{BatchMessage, MessageItem, SimpleMessage};

/// 协议层统一的结果别名。
pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;
