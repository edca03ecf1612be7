//! 引擎上下文与协作者接口
//!
//! 上下文由驱动循环的长生命周期持有者显式创建，以句柄传入每次分发，
//! 不使用任何全局单例，生命周期和测试隔离因此是显式的。

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use std::sync::Arc;

use tokio::sync::Mutex;

use matp_common::TestRecord;
use matp_transport::RemoteChannel;

use crate::EngineConfig;

/// 应用映射协作者
///
/// GUI 对象识别属于外部系统，引擎只消费解析结果。
pub trait ApplicationMap: Send + Sync {
    /// 解析窗口/组件名称为识别串，映射中不存在时返回 None
    fn resolve(&self, map_name: &str, window_name: &str, component_name: &str) -> Option<String>;
}

/// 变量存储协作者
///
/// `AssignClipboardVariable` 等关键字把远端取回的值写入驱动变量。
pub trait VariableStore: Send + Sync {
    /// 写入变量，成功返回 true
    fn set(&self, name: &str, value: &str) -> bool;

    /// 读取变量
    fn get(&self, name: &str) -> Option<String>;
}

/// 引擎上下文
///
/// 远端通道同一时刻只允许一个在途调用，以互斥锁保证。
pub struct EngineContext {
    /// 远端通道
    pub channel: Mutex<RemoteChannel>,

    /// 应用映射协作者
    pub appmap: Arc<dyn ApplicationMap>,

    /// 变量存储协作者
    pub vars: Arc<dyn VariableStore>,

    /// 引擎配置
    pub config: EngineConfig,
}

impl EngineContext {
    /// 创建新的引擎上下文
    pub fn new(
        channel: RemoteChannel,
        appmap: Arc<dyn ApplicationMap>,
        vars: Arc<dyn VariableStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            channel: Mutex::new(channel),
            appmap,
            vars,
            config,
        }
    }

    /// 为记录填充窗口和组件识别串
    ///
    /// 映射中没有条目时回落到字面名称本身，"当前窗口"之类的
    /// 伪组件因此可以正常工作。
    pub fn resolve_recognition(&self, record: &mut TestRecord) {
        let map_name = &self.config.map_name;
        let window_rec = self
            .appmap
            .resolve(map_name, &record.window_name, &record.window_name)
            .unwrap_or_else(|| record.window_name.clone());
        let component_rec = self
            .appmap
            .resolve(map_name, &record.window_name, &record.component_name)
            .unwrap_or_else(|| record.component_name.clone());
        record.window_rec = Some(window_rec);
        record.component_rec = Some(component_rec);
    }
}

/// 内存应用映射（测试和独立运行使用）
#[derive(Default)]
pub struct InMemoryAppMap {
    entries: HashMap<(String, String), String>,
}

impl InMemoryAppMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条识别串
    pub fn insert(
        &mut self,
        window_name: impl Into<String>,
        component_name: impl Into<String>,
        recognition: impl Into<String>,
    ) {
        self.entries.insert(
            (window_name.into(), component_name.into()),
            recognition.into(),
        );
    }
}

impl ApplicationMap for InMemoryAppMap {
    fn resolve(&self, _map_name: &str, window_name: &str, component_name: &str) -> Option<String> {
        self.entries
            .get(&(window_name.to_string(), component_name.to_string()))
            .cloned()
    }
}

/// 内存变量存储（测试和独立运行使用）
#[derive(Default)]
pub struct InMemoryVariableStore {
    values: StdMutex<HashMap<String, String>>,
}

impl InMemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VariableStore for InMemoryVariableStore {
    fn set(&self, name: &str, value: &str) -> bool {
        match self.values.lock() {
            Ok(mut values) => {
                values.insert(name.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.lock().ok()?.get(name).cloned()
    }
}
