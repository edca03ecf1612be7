//! 处理器注册表
//!
//! 目标标识到处理器的显式注册表：工厂函数在启动时登记，
//! 实例在首次查询时惰性构造并缓存，在整个运行期间复用。
//! 查询失败是类型化错误，由分发方吸收为路由失败，绝不导致链崩溃。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use matp_protocol::target;

use crate::component::ComponentCommandProcessor;
use crate::driver::DriverCommandProcessor;
use crate::engine_commands::EngineCommandProcessor;
use crate::processor::KeywordProcessor;
use crate::{EngineError, Result};

/// 处理器工厂函数
pub type ProcessorFactory = fn() -> Arc<dyn KeywordProcessor>;

/// 处理器注册表
///
/// 缓存假设同一时刻至多一条记录在途；写锁保证并发复用时
/// 每个目标仍然至多构造一个实例。
pub struct ProcessorRegistry {
    /// 目标标识到工厂函数的登记表
    factories: HashMap<String, ProcessorFactory>,

    /// 已构造实例的缓存
    cache: RwLock<HashMap<String, Arc<dyn KeywordProcessor>>>,
}

impl ProcessorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 创建登记了全部内置处理器的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(target::DRIVER, || Arc::new(DriverCommandProcessor::new()));
        registry.register(target::ENGINE, || Arc::new(EngineCommandProcessor::new()));
        registry.register(target::COMP_ROUTING, || {
            Arc::new(ComponentCommandProcessor::new())
        });
        registry
    }

    /// 登记一个目标的处理器工厂
    pub fn register(&mut self, target: &str, factory: ProcessorFactory) {
        info!("登记处理器工厂: {}", target);
        self.factories.insert(target.to_string(), factory);
    }

    /// 查询目标的处理器实例
    ///
    /// 同一目标重复查询返回同一个缓存实例，不同目标返回不同实例。
    pub async fn lookup(&self, target: &str) -> Result<Arc<dyn KeywordProcessor>> {
        {
            let cache = self.cache.read().await;
            if let Some(processor) = cache.get(target) {
                return Ok(Arc::clone(processor));
            }
        }

        let factory = self
            .factories
            .get(target)
            .ok_or_else(|| EngineError::UnknownTarget(target.to_string()))?;

        let mut cache = self.cache.write().await;
        // 双重检查：写锁等待期间可能已有并发构造
        if let Some(processor) = cache.get(target) {
            return Ok(Arc::clone(processor));
        }

        debug!("惰性构造处理器: {}", target);
        let processor = factory();
        cache.insert(target.to_string(), Arc::clone(&processor));
        Ok(processor)
    }

    /// 已登记的目标列表
    pub fn targets(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_returns_cached_instance() {
        let registry = ProcessorRegistry::with_defaults();

        let first = registry.lookup(target::DRIVER).await.unwrap();
        let second = registry.lookup(target::DRIVER).await.unwrap();
        // 同一目标：同一个实例
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.lookup(target::ENGINE).await.unwrap();
        // 不同目标：不同实例
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_unknown_target_is_typed_error() {
        let registry = ProcessorRegistry::with_defaults();
        let err = registry.lookup("no_such_target").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownTarget(t) if t == "no_such_target"));
    }

    #[tokio::test]
    async fn test_empty_registry_has_no_targets() {
        let registry = ProcessorRegistry::new();
        assert!(registry.targets().is_empty());
        assert!(registry.lookup(target::DRIVER).await.is_err());
    }
}
