//! MATP 引擎
//!
//! 把抽象的测试关键字翻译为远端调用，并把异步、弱类型的远端结果
//! 映射回同步的驱动状态码和分支决策。
//!
//! 关键字经由处理器链按序路由：每个处理器认领自己的关键字子集，
//! 未被认领的命令继续向后传递，兜底的组件路由处理器排在最后。

pub mod chain;
pub mod config;
pub mod context;
pub mod driver;
pub mod engine_commands;
pub mod component;
pub mod processor;
pub mod registry;

pub use chain::{Engine, ProcessorChain};
pub use config::EngineConfig;
pub use context::{ApplicationMap, EngineContext, InMemoryAppMap, InMemoryVariableStore, VariableStore};
pub use processor::KeywordProcessor;
pub use registry::{ProcessorFactory, ProcessorRegistry};

use thiserror::Error;

/// 引擎层错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("未知的路由目标: {0}")]
    UnknownTarget(String),

    #[error("传输层错误: {0}")]
    Transport(#[from] matp_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
