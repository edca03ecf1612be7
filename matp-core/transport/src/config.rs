//! 通道配置

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 远端通道配置
///
/// ready 和 running 预算在一次运行中固定；results 预算由引擎
/// 按关键字逐次计算后传入 [`crate::RemoteChannel::call`]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 等待远端确认收到请求的预算（秒）
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: u64,

    /// 等待远端开始执行的预算（秒）
    #[serde(default = "default_running_timeout")]
    pub running_timeout: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ready_timeout: default_ready_timeout(),
            running_timeout: default_running_timeout(),
        }
    }
}

impl ChannelConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }

    pub fn running_timeout(&self) -> Duration {
        Duration::from_secs(self.running_timeout)
    }
}

// 默认值函数
fn default_ready_timeout() -> u64 {
    120
}

fn default_running_timeout() -> u64 {
    60
}
