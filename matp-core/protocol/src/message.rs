//! 消息信封
//!
//! 驱动侧引擎与远端运行时之间交换的扁平键值属性包，每次请求/响应各一个。

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ProtocolError, Result};

/// 信封的保留键
pub mod keys {
    /// 路由目标，决定远端由哪个处理器家族处理命令
    pub const TARGET: &str = "target";
    /// 关键字命令
    pub const COMMAND: &str = "command";
    /// 远端执行预算（秒）
    pub const TIMEOUT: &str = "timeout";
    /// 参数键前缀，参数从 param1 开始编号，不补零
    pub const PARAM_PREFIX: &str = "param";

    /// 窗口名称
    pub const WINNAME: &str = "winname";
    /// 组件名称
    pub const COMPNAME: &str = "compname";
    /// 窗口识别串
    pub const WINREC: &str = "winrec";
    /// 组件识别串
    pub const COMPREC: &str = "comprec";

    /// 调用生命周期阶段信号（ready / running / results / exception）
    pub const PHASE: &str = "phase";
    /// 远端异常的说明文本（随 phase=exception 返回）
    pub const EXCEPTION_MSG: &str = "exceptionmsg";

    /// 是否为远端结果（读取方信任其他结果字段之前必须先检查它）
    pub const IS_REMOTE_RESULT: &str = "isremoteresult";
    /// 远端结果码
    pub const REMOTE_RESULT_CODE: &str = "remoteresultcode";
    /// 远端结果信息
    pub const REMOTE_RESULT_INFO: &str = "remoteresultinfo";

    /// 主消息的资源包名称
    pub const BUNDLE_NAME_FOR_MSG: &str = "rb_name_4_msg";
    /// 主消息在资源包中的键
    pub const BUNDLE_KEY_FOR_MSG: &str = "rb_key_4_msg";
    /// 主消息的参数列表（首字符为分隔符）
    pub const BUNDLE_PARAMS_FOR_MSG: &str = "rb_params_4_msg";
    /// 主消息的替代文本
    pub const BUNDLE_ALTTEXT_FOR_MSG: &str = "rb_alttext_4_msg";

    /// 详情消息的资源包名称
    pub const BUNDLE_NAME_FOR_DETAIL: &str = "rb_name_4_d_msg";
    /// 详情消息在资源包中的键
    pub const BUNDLE_KEY_FOR_DETAIL: &str = "rb_key_4_d_msg";
    /// 详情消息的参数列表（首字符为分隔符）
    pub const BUNDLE_PARAMS_FOR_DETAIL: &str = "rb_params_4_d_msg";
    /// 详情消息的替代文本
    pub const BUNDLE_ALTTEXT_FOR_DETAIL: &str = "rb_alttext_4_d_msg";
}

/// 阶段信号的取值
pub mod phase {
    /// 远端已确认收到请求
    pub const READY: &str = "ready";
    /// 远端已开始执行
    pub const RUNNING: &str = "running";
    /// 远端执行完成，信封携带结果字段
    pub const RESULTS: &str = "results";
    /// 远端内部抛出异常
    pub const EXCEPTION: &str = "exception";
}

/// 消息信封
///
/// 保持插入顺序的字符串到字符串映射。写入方在发送前必须设置
/// target 和 command；同名键写入时原地替换。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    entries: Vec<(String, String)>,
}

impl Envelope {
    /// 创建空信封
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 构造一次远端调用的请求信封
    ///
    /// 设置 target、command、param1..paramN 和 timeout。
    /// 参数索引从 1 开始，不补零。
    pub fn build(target: &str, command: &str, params: &[String], timeout_secs: u64) -> Self {
        let mut envelope = Self::new();
        envelope.set(keys::TARGET, target);
        envelope.set(keys::COMMAND, command);
        for (i, param) in params.iter().enumerate() {
            envelope.set(&format!("{}{}", keys::PARAM_PREFIX, i + 1), param);
        }
        envelope.set(keys::TIMEOUT, timeout_secs.to_string());
        envelope
    }

    /// 写入键值，同名键原地替换
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    /// 读取键值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 检查键是否存在
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// 键值对数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按插入顺序迭代键值对
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 读取必需的键，缺失时返回协议错误
    pub fn require(&self, key: &'static str) -> Result<&str> {
        self.get(key).ok_or(ProtocolError::MissingKey(key))
    }

    /// 编码为单行 JSON 文本
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::EncodeFailed(e.to_string()))
    }

    /// 从 JSON 文本解析信封
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::DecodeFailed(e.to_string()))
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = Envelope;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a flat string-to-string map")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut access: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut envelope = Envelope::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            envelope.set(&key, value);
        }
        Ok(envelope)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(EnvelopeVisitor)
    }
}
