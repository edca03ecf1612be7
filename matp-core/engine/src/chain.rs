//! 关键字处理器链
//!
//! 有序的处理器列表由单个分发循环求值，没有隐藏的递归转发，
//! 完整顺序在一处可见。处理器顺序是契约的一部分：兜底处理器
//! 必须排在最后。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use matp_common::{StatusCode, TestRecord};
use matp_protocol::target;

use crate::context::EngineContext;
use crate::processor::KeywordProcessor;
use crate::registry::ProcessorRegistry;

/// 处理器链
pub struct ProcessorChain {
    handlers: Vec<Arc<dyn KeywordProcessor>>,
}

impl ProcessorChain {
    /// 从有序处理器列表创建链
    pub fn new(handlers: Vec<Arc<dyn KeywordProcessor>>) -> Self {
        Self { handlers }
    }

    /// 按标准顺序从注册表组装链：驱动命令、引擎命令、组件路由（兜底）
    ///
    /// 某个目标构造失败只影响该处理器，被吸收为路由失败并继续组装，
    /// 绝不导致链崩溃。
    pub async fn standard(registry: &ProcessorRegistry) -> Self {
        let mut handlers: Vec<Arc<dyn KeywordProcessor>> = Vec::new();
        for target in [target::DRIVER, target::ENGINE, target::COMP_ROUTING] {
            match registry.lookup(target).await {
                Ok(processor) => handlers.push(processor),
                Err(e) => error!("处理器 {} 不可用，跳过: {}", target, e),
            }
        }
        Self::new(handlers)
    }

    /// 链上处理器数量
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// 链是否为空
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 沿链分发一条记录
    ///
    /// 任何处理器把状态设置为非"未执行"的瞬间，迭代立即停止。
    /// 链走完仍是未执行时由驱动循环负责大声报告，这里不处理。
    pub async fn process(&self, record: &mut TestRecord, ctx: &EngineContext) {
        for handler in &self.handlers {
            if record.status.code != StatusCode::NotExecuted {
                break;
            }
            if !handler.claims(&record.command) {
                continue;
            }
            debug!("{} 认领命令 {}", handler.name(), record.command);
            handler.process(record, ctx).await;
        }
    }
}

/// 驱动侧引擎
///
/// 驱动循环的入口：每条记录完整经历分发、调用、翻译之后才开始下一条，
/// 同一会话不存在重叠的远端调用。
pub struct Engine {
    ctx: Arc<EngineContext>,
    registry: Arc<ProcessorRegistry>,
    chain: ProcessorChain,
}

impl Engine {
    /// 用内置处理器创建引擎
    pub async fn new(ctx: Arc<EngineContext>) -> Self {
        Self::with_registry(ctx, Arc::new(ProcessorRegistry::with_defaults())).await
    }

    /// 用外部注册表创建引擎
    pub async fn with_registry(ctx: Arc<EngineContext>, registry: Arc<ProcessorRegistry>) -> Self {
        let chain = ProcessorChain::standard(&registry).await;
        info!("引擎就绪，链上共 {} 个处理器", chain.len());
        Self {
            ctx,
            registry,
            chain,
        }
    }

    /// 处理一条测试记录，原地修改状态和处理标志
    pub async fn process(&self, record: &mut TestRecord) {
        self.chain.process(record, &self.ctx).await;

        if record.status.code == StatusCode::NotExecuted {
            // 没有任何引擎理解此命令，这是一个显眼的条件，不是静默空操作
            warn!(
                "没有处理器认领命令 {:?}，记录保持未执行",
                record.command
            );
            record.processed = false;
        }
    }

    /// 本引擎是否处理了最近一条记录
    pub fn is_record_processed(&self, record: &TestRecord) -> bool {
        record.is_record_processed()
    }

    /// 访问处理器注册表
    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// 访问引擎上下文
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }
}
