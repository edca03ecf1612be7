//! 引擎配置

use std::time::Duration;

use serde::{Deserialize, Serialize};

use matp_transport::ChannelConfig;

/// 引擎配置
///
/// 超时值、应用映射名称等均由外部提供，本层不拥有任何持久化格式。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 等待窗口出现的预算（秒）
    #[serde(default = "default_window_wait")]
    pub window_wait: u64,

    /// 等待组件出现的预算（秒）
    #[serde(default = "default_component_wait")]
    pub component_wait: u64,

    /// 识别串解析使用的应用映射名称
    #[serde(default)]
    pub map_name: String,

    /// 通道配置（ready / running 预算）
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_wait: default_window_wait(),
            component_wait: default_component_wait(),
            map_name: String::new(),
            channel: ChannelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 按通用公式计算一次命令的完成预算
    ///
    /// `max(窗口等待, 组件等待) + 关键字超时`。固定超时类的命令
    /// （15s / 60s / 120s）不走此公式，直接使用类内的固定值。
    pub fn results_timeout(&self, keyword_timeout: u64) -> Duration {
        Duration::from_secs(self.window_wait.max(self.component_wait) + keyword_timeout)
    }
}

// 默认值函数
fn default_window_wait() -> u64 {
    30
}

fn default_component_wait() -> u64 {
    30
}
