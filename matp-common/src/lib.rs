//! MATP 通用类型定义
//!
//! 此 crate 包含驱动侧引擎各层共享的状态码、执行状态和测试记录类型。

use serde::{Deserialize, Serialize};

/// 驱动侧的规范空值哨兵
///
/// 协议的空值字面量在进入驱动侧之前必须被改写为此哨兵，
/// 否则无法区分"字段缺失"和"值恰好是哨兵字符串"。
pub const DRIVER_NULL: &str = "<MATP_NULL>";

/// 本地状态码（封闭枚举）
///
/// 每条测试记录同一时刻只有一个生效的状态码。
/// 远端返回的状态码属于另一套编码，必须经过结果翻译器转换，
/// 无法识别的远端状态码一律保守地映射为 `GeneralFailure`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// 未执行（链上没有处理器认领，或远端未执行）
    NotExecuted,
    /// 执行成功，无失败
    NoFailure,
    /// 执行完成但有警告
    Warning,
    /// 一般性失败（也是所有未知情况的安全默认值）
    GeneralFailure,
    /// IO 失败
    IoError,
    /// 窗口未找到
    WindowNotFound,
    /// 组件未找到
    ComponentNotFound,
    /// 退出当前测试表
    ExitTable,
    /// 忽略返回码
    IgnoreReturnCode,
    /// 记录类型缺失
    NoRecordType,
    /// 记录类型无法识别
    UnrecognizedRecordType,
    /// 字段数量错误
    WrongFieldCount,
    /// 跳转到指定块（块 ID 存放在状态的 detail 字段）
    BranchToBlock,
}

impl StatusCode {
    /// 获取状态码的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NotExecuted => "NOT_EXECUTED",
            Self::NoFailure => "NO_FAILURE",
            Self::Warning => "WARNING",
            Self::GeneralFailure => "GENERAL_FAILURE",
            Self::IoError => "IO_ERROR",
            Self::WindowNotFound => "WINDOW_NOT_FOUND",
            Self::ComponentNotFound => "COMPONENT_NOT_FOUND",
            Self::ExitTable => "EXIT_TABLE",
            Self::IgnoreReturnCode => "IGNORE_RETURN_CODE",
            Self::NoRecordType => "NO_RECORD_TYPE",
            Self::UnrecognizedRecordType => "UNRECOGNIZED_RECORD_TYPE",
            Self::WrongFieldCount => "WRONG_FIELD_COUNT",
            Self::BranchToBlock => "BRANCH_TO_BLOCK",
        }
    }

    /// 检查是否为失败类状态
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::GeneralFailure
                | Self::IoError
                | Self::WindowNotFound
                | Self::ComponentNotFound
                | Self::NoRecordType
                | Self::UnrecognizedRecordType
                | Self::WrongFieldCount
        )
    }
}

/// 一次远端调用的执行状态
///
/// 由结果翻译器为每次远端调用创建，由发起调用的处理器消费，
/// 不会跨测试步骤持久化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    /// 状态码
    pub code: StatusCode,

    /// 可选的说明文本
    pub comment: Option<String>,

    /// 可选的详情文本（分支跳转时存放块 ID）
    pub detail: Option<String>,
}

impl ExecutionStatus {
    /// 创建只有状态码的执行状态
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            comment: None,
            detail: None,
        }
    }

    /// 创建带说明文本的执行状态
    pub fn with_comment(code: StatusCode, comment: impl Into<String>) -> Self {
        Self {
            code,
            comment: Some(comment.into()),
            detail: None,
        }
    }

    /// 创建带说明和详情文本的执行状态
    pub fn with_detail(
        code: StatusCode,
        comment: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code,
            comment: Some(comment.into()),
            detail: Some(detail.into()),
        }
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::new(StatusCode::NotExecuted)
    }
}

/// 测试记录
///
/// 每条输入行创建一条记录，被触及的每个处理器都可以原地修改它，
/// 记录在日志输出之后即被丢弃。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    /// 窗口名称
    pub window_name: String,

    /// 组件名称
    pub component_name: String,

    /// 关键字命令
    pub command: String,

    /// 窗口识别串（由外部应用映射解析得到）
    pub window_rec: Option<String>,

    /// 组件识别串（由外部应用映射解析得到）
    pub component_rec: Option<String>,

    /// 有序参数列表
    pub params: Vec<String>,

    /// 当前执行状态
    pub status: ExecutionStatus,

    /// 本引擎是否已处理此记录
    ///
    /// 驱动循环据此区分"引擎已处理"和"转交下一个引擎"。
    pub processed: bool,
}

impl TestRecord {
    /// 创建新的测试记录
    pub fn new(
        window_name: impl Into<String>,
        component_name: impl Into<String>,
        command: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            window_name: window_name.into(),
            component_name: component_name.into(),
            command: command.into(),
            window_rec: None,
            component_rec: None,
            params,
            status: ExecutionStatus::default(),
            processed: false,
        }
    }

    /// 创建只有命令和参数的驱动命令记录
    pub fn driver_command(command: impl Into<String>, params: Vec<String>) -> Self {
        Self::new("", "", command, params)
    }

    /// 本引擎是否已处理此记录
    pub fn is_record_processed(&self) -> bool {
        self.processed
    }

    /// 重置执行状态为未执行
    pub fn reset_status(&mut self) {
        self.status = ExecutionStatus::default();
        self.processed = false;
    }
}
