//! MATP 协议层
//!
//! 定义驱动侧与远端自动化运行时之间交换的扁平键值消息信封，
//! 以及把远端结果翻译为本地状态码的结果翻译器。

pub mod message;
pub mod result;
pub mod translator;

pub use message::{keys, Envelope};
pub use result::RemoteResult;
pub use translator::{translate, MessageDescriptor, TranslatedResult};

use thiserror::Error;

/// 协议层错误
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("信封编码失败: {0}")]
    EncodeFailed(String),

    #[error("信封解析失败: {0}")]
    DecodeFailed(String),

    #[error("信封缺少必需的键: {0}")]
    MissingKey(&'static str),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// 协议的空值字面量
///
/// 线上格式无法区分"字段缺失"和"值恰好是哨兵字符串"，
/// 读取方在使用字符串字段前必须把此字面量改写为 [`matp_common::DRIVER_NULL`]。
pub const NULL_VALUE: &str = "<NULL>";

/// 列表值字段的协议分隔符
///
/// 信封不支持嵌套，列表值（如捕获的屏幕条目文本）被拼接为单个字符串。
pub const LIST_DELIMITER: char = ',';

/// 远端结果码（与本地状态码是两套不同的编码）
pub mod remote_code {
    /// 远端未执行
    pub const NOT_EXECUTED: i64 = -1;
    /// 远端执行成功
    pub const OK: i64 = 0;
    /// 远端执行完成但有警告（分支命令用它表示"条件未满足"）
    pub const WARN: i64 = 1;
    /// 远端执行失败
    pub const FAIL: i64 = 2;
}

/// 路由目标标识
pub mod target {
    /// 驱动命令处理器（流程控制、剪贴板、截屏）
    pub const DRIVER: &str = "driver";
    /// 引擎检查命令处理器
    pub const ENGINE: &str = "engine";
    /// 组件命令路由处理器（兜底）
    pub const COMP_ROUTING: &str = "comprouting";
}
