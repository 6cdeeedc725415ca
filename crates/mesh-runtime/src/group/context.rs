use std::{fmt, sync::Arc, time::Instant};

use mesh_protocol::{Envelope, RequestHeader};

/// 一次发送族调用的上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：把业务序列号、信封与请求头绑在一起交给组管理器，日志中可用一行定位调用；
/// - **契约 (What)**：`biz_seq_no` 缺省取信封的 `sequence_number`；请求头可选，
///   设置后会同时挂到信封上；
/// - **风险 (Trade-offs)**：`created_at` 使用单调时钟，只适合计算耗时，不能当作墙钟时间展示。
#[derive(Clone, Debug)]
pub struct SendContext {
    biz_seq_no: String,
    envelope: Envelope,
    header: Option<Arc<RequestHeader>>,
    created_at: Instant,
}

impl SendContext {
    pub fn new(envelope: Envelope) -> Self {
        let header = envelope.header.clone();
        Self {
            biz_seq_no: envelope.sequence_number.clone(),
            envelope,
            header,
            created_at: Instant::now(),
        }
    }

    pub fn with_biz_seq_no(mut self, biz_seq_no: impl Into<String>) -> Self {
        self.biz_seq_no = biz_seq_no.into();
        self
    }

    pub fn with_header(mut self, header: Arc<RequestHeader>) -> Self {
        self.envelope.header = Some(Arc::clone(&header));
        self.header = Some(header);
        self
    }

    pub fn biz_seq_no(&self) -> &str {
        &self.biz_seq_no
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn header(&self) -> Option<&RequestHeader> {
        self.header.as_deref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }
}

impl From<Envelope> for SendContext {
    fn from(envelope: Envelope) -> Self {
        SendContext::new(envelope)
    }
}

impl fmt::Display for SendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sendContext={{bizSeqNo={},topic={},uniqueId={},elapsedMs={}}}",
            self.biz_seq_no,
            self.envelope.topic,
            self.envelope.unique_id,
            self.created_at.elapsed().as_millis()
        )
    }
}
