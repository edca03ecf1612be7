//! 远端结果视图
//!
//! 对返回信封的只读类型化访问。键缺失或值格式错误时返回默认值，
//! 绝不报错。

use matp_common::DRIVER_NULL;

use crate::message::{keys, Envelope};
use crate::NULL_VALUE;

/// 远端结果
///
/// 包装一个返回信封。读取方必须先检查 [`RemoteResult::is_remote_result`]，
/// 才能信任其他结果字段。
#[derive(Debug, Clone)]
pub struct RemoteResult {
    envelope: Envelope,
}

impl RemoteResult {
    /// 从返回信封创建结果视图
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope }
    }

    /// 返回信封是否声明自己是远端结果
    pub fn is_remote_result(&self) -> bool {
        self.get_bool(keys::IS_REMOTE_RESULT, false)
    }

    /// 读取字符串字段，缺失时返回默认值
    ///
    /// 协议的空值字面量被改写为驱动侧的规范空值哨兵。
    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.envelope.get(key) {
            Some(value) if value == NULL_VALUE => DRIVER_NULL.to_string(),
            Some(value) => value.to_string(),
            None => default.to_string(),
        }
    }

    /// 读取可选字符串字段，缺失时返回 None
    pub fn get_opt_str(&self, key: &str) -> Option<String> {
        self.envelope.get(key).map(|value| {
            if value == NULL_VALUE {
                DRIVER_NULL.to_string()
            } else {
                value.to_string()
            }
        })
    }

    /// 读取整数字段，缺失或格式错误时返回默认值
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.envelope
            .get(key)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// 读取布尔字段，缺失或格式错误时返回默认值
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.envelope
            .get(key)
            .and_then(|value| match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    /// 检查键是否存在
    pub fn has_key(&self, key: &str) -> bool {
        self.envelope.contains_key(key)
    }

    /// 访问底层信封
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }
}
