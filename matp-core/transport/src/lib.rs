//! MATP 传输层
//!
//! 负责驱动侧与远端运行时之间的阻塞式请求/响应调用，
//! 对单次调用强制执行 ready / running / results 三个串行且独立的超时预算。

pub mod channel;
pub mod config;
pub mod tcp;

pub use channel::{RemoteChannel, RemoteTransport};
pub use config::ChannelConfig;
pub use tcp::TcpTransport;

use std::fmt;

use thiserror::Error;

/// 单次远端调用的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// 等待远端确认收到请求
    Ready,
    /// 等待远端开始执行
    Running,
    /// 等待命令执行完成
    Results,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Results => "results",
        };
        f.write_str(name)
    }
}

/// 传输层错误
///
/// 超时、连接断开、关闭信号、远端应用异常等失败模式必须保持
/// 可区分并向上传播，任何一种都不允许被吞掉。
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("等待 {0} 信号超时")]
    Timeout(TimeoutPhase),

    #[error("连接失败: {0}")]
    ConnectionFailed(String),

    #[error("连接已断开: {0}")]
    Disconnected(String),

    #[error("调用期间收到关闭信号")]
    Shutdown,

    #[error("远端应用异常: {0}")]
    RemoteApplication(String),

    #[error("协议错误: {0}")]
    Protocol(#[from] matp_protocol::ProtocolError),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
