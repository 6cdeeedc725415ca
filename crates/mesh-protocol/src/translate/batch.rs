use std::sync::Arc;

use crate::{
    envelope::Envelope,
    error::ProtocolError,
    wire::{BatchMessage, MessageItem},
};

use super::{ProtocolFamily, WireContext, WireView, decode, encode};

/// 出站批量：一组共享主题的信封 → 批量线路消息。
///
/// # 教案式说明
/// - **契约 (What)**：主题取第一条信封的主题，条目顺序与输入一致；空输入返回
///   [`ProtocolError::InvalidArgument`]；任一条目转换失败时整批失败。
/// - **风险 (Trade-offs)**：不校验其余信封的主题，主题不一致的条目会被并入首条主题。
pub fn to_batch_message(
    envelopes: &[Envelope],
    context: &WireContext,
    family: ProtocolFamily,
) -> Result<BatchMessage, ProtocolError> {
    let first = envelopes
        .first()
        .ok_or_else(|| ProtocolError::invalid_argument("batch requires at least one message"))?;

    let items = envelopes
        .iter()
        .map(|envelope| encode(family, envelope).map(MessageItem::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchMessage {
        header: Some(context.header.clone()),
        producer_group: context.producer_group.clone(),
        topic: first.topic.clone(),
        items,
    })
}

/// 入站批量：批量线路消息 → 信封序列，全部条目共享批量的主题与请求头。
pub fn from_batch_message(
    batch: &BatchMessage,
    family: ProtocolFamily,
) -> Result<Vec<Envelope>, ProtocolError> {
    if batch.items.is_empty() {
        return Err(ProtocolError::invalid_argument(
            "batch requires at least one message",
        ));
    }
    let header = batch.header.clone().map(Arc::new);

    batch
        .items
        .iter()
        .map(|item| {
            let view = WireView {
                topic: &batch.topic,
                content: &item.content,
                ttl: &item.ttl,
                seq_num: &item.seq_num,
                unique_id: &item.unique_id,
                properties: &item.properties,
            };
            decode(family, &view).map(|mut envelope| {
                envelope.header = header.clone();
                envelope
            })
        })
        .collect()
}
