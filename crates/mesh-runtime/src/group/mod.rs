//! 生产/消费组：生命周期状态机与发送上下文。

mod context;
mod manager;

use std::fmt;

pub use context::SendContext;
pub use manager::GroupManager;

/// 组（以及连接器）的生命周期状态。
///
/// 不变量：`Started` 蕴含已初始化；`Initialized` 可以长期停留而不启动。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Started,
}

impl LifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
        }
    }

    pub const fn is_initialized(self) -> bool {
        !matches!(self, LifecycleState::Uninitialized)
    }

    pub const fn is_started(self) -> bool {
        matches!(self, LifecycleState::Started)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
