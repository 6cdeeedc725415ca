//! # 伪造标识生成
//!
//! ## 意图（Why）
//! - 入站消息缺失 `sequence_number` 或 `unique_id` 时，需要一个与其他语言 SDK 一致的占位值：
//!   固定 30 位的十进制数字串。
//!
//! ## 契约（What）
//! - [`fabricate_id`] 每次调用都返回新的随机值，同一线路字节转换两次会得到两个不同结果；
//! - 生成的值**不单调**、不具备密码学安全性，也不保证全局唯一。依赖这些字段做下游去重时，
//!   只能视为尽力而为的近似，而非正确性保证。

use rand::Rng;

/// 伪造标识的固定长度。
pub const FABRICATED_ID_LEN: usize = 30;

/// 生成指定长度的随机十进制数字串。
pub fn generate_num(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// 生成 30 位伪造标识。
pub fn fabricate_id() -> String {
    generate_num(FABRICATED_ID_LEN)
}

/// 若 `value` 为空则伪造新值，否则原样返回。
pub(crate) fn or_fabricate(value: &str) -> String {
    if value.is_empty() {
        fabricate_id()
    } else {
        value.to_owned()
    }
}

/// 判断字符串是否为伪造格式（固定长度的纯数字）。
pub fn is_fabricated_shape(value: &str) -> bool {
    value.len() == FABRICATED_ID_LEN && value.bytes().all(|b| b.is_ascii_digit())
}
