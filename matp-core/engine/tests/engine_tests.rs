//! 引擎端到端测试
//!
//! 用脚本化的桩传输驱动完整的分发、调用、翻译路径：
//! 每次 send 之后桩自动补齐 ready / running 两个阶段信号，
//! 再回放下一个预先脚本化的结果信封。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::watch;

use matp_common::{StatusCode, TestRecord};
use matp_engine::{Engine, EngineConfig, EngineContext, InMemoryAppMap, InMemoryVariableStore};
use matp_protocol::message::{keys, phase};
use matp_protocol::Envelope;
use matp_transport::{ChannelConfig, RemoteChannel, RemoteTransport};

/// 桩传输：记录发出的信封，按脚本回放结果
struct MockTransport {
    /// 待回放的接收队列
    inbox: VecDeque<Envelope>,

    /// 每次 send 之后回放的结果信封脚本
    results: VecDeque<Envelope>,

    /// 发送计数（断言"零远端调用"用）
    sends: Arc<AtomicUsize>,

    /// 发出的全部请求信封
    sent: Arc<StdMutex<Vec<Envelope>>>,
}

impl MockTransport {
    fn new(
        results: Vec<Envelope>,
    ) -> (Self, Arc<AtomicUsize>, Arc<StdMutex<Vec<Envelope>>>) {
        let sends = Arc::new(AtomicUsize::new(0));
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let transport = Self {
            inbox: VecDeque::new(),
            results: results.into(),
            sends: Arc::clone(&sends),
            sent: Arc::clone(&sent),
        };
        (transport, sends, sent)
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn send(&mut self, envelope: &Envelope) -> matp_transport::Result<()> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(envelope.clone());

        self.inbox.push_back(phase_envelope(phase::READY));
        self.inbox.push_back(phase_envelope(phase::RUNNING));
        if let Some(result) = self.results.pop_front() {
            self.inbox.push_back(result);
        }
        Ok(())
    }

    async fn receive(&mut self) -> matp_transport::Result<Envelope> {
        match self.inbox.pop_front() {
            Some(envelope) => Ok(envelope),
            // 脚本耗尽后永远不再响应
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

fn phase_envelope(p: &str) -> Envelope {
    let mut envelope = Envelope::new();
    envelope.set(keys::PHASE, p);
    envelope
}

/// 构造一个结果信封
fn result_envelope(code: i64, info: Option<&str>) -> Envelope {
    let mut envelope = phase_envelope(phase::RESULTS);
    envelope.set(keys::IS_REMOTE_RESULT, "true");
    envelope.set(keys::REMOTE_RESULT_CODE, code.to_string());
    if let Some(info) = info {
        envelope.set(keys::REMOTE_RESULT_INFO, info);
    }
    envelope
}

struct Harness {
    ctx: Arc<EngineContext>,
    sends: Arc<AtomicUsize>,
    sent: Arc<StdMutex<Vec<Envelope>>>,
    vars: Arc<InMemoryVariableStore>,
}

/// 初始化测试日志（RUST_LOG 控制级别，重复调用只生效一次）
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn harness(results: Vec<Envelope>) -> Harness {
    init_tracing();
    let (transport, sends, sent) = MockTransport::new(results);
    let channel = RemoteChannel::without_shutdown(
        Box::new(transport),
        ChannelConfig {
            ready_timeout: 2,
            running_timeout: 2,
        },
    );
    let vars = Arc::new(InMemoryVariableStore::new());
    let ctx = Arc::new(EngineContext::new(
        channel,
        Arc::new(InMemoryAppMap::new()),
        Arc::clone(&vars) as Arc<dyn matp_engine::VariableStore>,
        EngineConfig::default(),
    ));
    Harness {
        ctx,
        sends,
        sent,
        vars,
    }
}

fn params(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_branch_on_condition_met() {
    let h = harness(vec![result_envelope(0, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command(
        "OnGuiExistsGotoBlockID",
        params(&["B1", "LoginWin", "OkButton"]),
    );
    engine.process(&mut record).await;

    // 条件成立：跳转，块 ID 在 detail
    assert_eq!(record.status.code, StatusCode::BranchToBlock);
    assert_eq!(record.status.detail.as_deref(), Some("B1"));
    assert!(record.is_record_processed());
    assert_eq!(h.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_branch_on_condition_not_met() {
    // 远端 WARN 表示条件不成立
    let h = harness(vec![result_envelope(1, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command(
        "OnGuiExistsGotoBlockID",
        params(&["B1", "LoginWin", "OkButton"]),
    );
    engine.process(&mut record).await;

    // 普通通过，不跳转
    assert_eq!(record.status.code, StatusCode::NoFailure);
    assert!(record.status.detail.is_none());
    assert!(record.is_record_processed());
}

#[tokio::test]
async fn test_missing_parameter_makes_zero_remote_calls() {
    let h = harness(vec![result_envelope(0, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    // 三个必需参数只给了两个
    let mut record =
        TestRecord::driver_command("OnGuiExistsGotoBlockID", params(&["B1", "LoginWin"]));
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::GeneralFailure);
    assert_eq!(h.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_driver_command_routes_to_driver_target() {
    let h = harness(vec![result_envelope(0, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command("WaitForGui", params(&["LoginWin", "OkButton"]));
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::NoFailure);
    let sent = h.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].get(keys::TARGET), Some("driver"));
    assert_eq!(sent[0].get(keys::COMMAND), Some("waitforgui"));
}

#[tokio::test]
async fn test_unclaimed_command_falls_through_to_component_routing() {
    let h = harness(vec![result_envelope(0, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::new("LoginWin", "OkButton", "Click", vec![]);
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::NoFailure);
    let sent = h.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    // 驱动和引擎处理器都不认领，命令落到兜底的组件路由
    assert_eq!(sent[0].get(keys::TARGET), Some("comprouting"));
    assert_eq!(sent[0].get(keys::WINNAME), Some("LoginWin"));
    assert_eq!(sent[0].get(keys::COMPNAME), Some("OkButton"));
}

#[tokio::test]
async fn test_wait_for_gui_not_met_is_warning() {
    let h = harness(vec![result_envelope(1, None)]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command("WaitForGui", params(&["LoginWin", "OkButton"]));
    engine.process(&mut record).await;

    // 等待超时不是失败，是警告
    assert_eq!(record.status.code, StatusCode::Warning);
    assert!(record.is_record_processed());
}

#[tokio::test]
async fn test_engine_command_publishes_status_variables() {
    let h = harness(vec![result_envelope(0, Some("MainWin"))]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command("GetCurrentWindow", vec![]);
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::NoFailure);
    assert_eq!(record.status.detail.as_deref(), Some("MainWin"));

    use matp_engine::VariableStore;
    assert_eq!(
        h.vars.get("Engine.Command").as_deref(),
        Some("getcurrentwindow")
    );
    assert_eq!(h.vars.get("Engine.StatusCode").as_deref(), Some("NO_FAILURE"));
    assert_eq!(h.vars.get("Engine.StatusInfo").as_deref(), Some("MainWin"));

    // 固定 15 秒类的预算随信封下发
    let sent = h.sent.lock().unwrap();
    assert_eq!(sent[0].get(keys::TARGET), Some("engine"));
    assert_eq!(sent[0].get(keys::TIMEOUT), Some("15"));
}

#[tokio::test]
async fn test_assign_clipboard_variable_stores_remote_content() {
    let h = harness(vec![result_envelope(0, Some("copied text"))]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command("AssignClipboardVariable", params(&["clip"]));
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::NoFailure);
    use matp_engine::VariableStore;
    assert_eq!(h.vars.get("clip").as_deref(), Some("copied text"));
}

#[tokio::test]
async fn test_remote_failure_code_is_hard_failure() {
    let h = harness(vec![result_envelope(2, Some("element stale"))]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::driver_command(
        "OnGuiNotExistGotoBlockID",
        params(&["B2", "LoginWin", "OkButton"]),
    );
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::GeneralFailure);
    assert!(record.is_record_processed());
}

#[tokio::test]
async fn test_shutdown_during_call_leaves_record_unclaimed() {
    let (transport, _sends, _sent) = MockTransport::new(vec![]);
    let (tx, rx) = watch::channel(false);
    let channel = RemoteChannel::new(
        Box::new(transport),
        ChannelConfig {
            ready_timeout: 30,
            running_timeout: 30,
        },
        rx,
    );
    let ctx = Arc::new(EngineContext::new(
        channel,
        Arc::new(InMemoryAppMap::new()),
        Arc::new(InMemoryVariableStore::new()),
        EngineConfig::default(),
    ));
    let engine = Engine::new(Arc::clone(&ctx)).await;

    // 调用前发出关闭信号
    tx.send(true).unwrap();

    let mut record = TestRecord::driver_command("WaitForGui", params(&["LoginWin", "OkButton"]));
    engine.process(&mut record).await;

    // 关闭不是失败：记录保持未执行，驱动循环据此收尾
    assert_eq!(record.status.code, StatusCode::NotExecuted);
    assert!(!record.is_record_processed());
}

#[tokio::test]
async fn test_remote_not_executed_leaves_record_for_next_engine() {
    let mut not_executed = result_envelope(-1, None);
    not_executed.set(keys::IS_REMOTE_RESULT, "true");
    let h = harness(vec![not_executed]);
    let engine = Engine::new(Arc::clone(&h.ctx)).await;

    let mut record = TestRecord::new("LoginWin", "OkButton", "Click", vec![]);
    engine.process(&mut record).await;

    assert_eq!(record.status.code, StatusCode::NotExecuted);
    assert!(!record.is_record_processed());
}
