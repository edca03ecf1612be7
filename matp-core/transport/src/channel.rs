//! 远端通道
//!
//! 每个测试步骤执行一次阻塞调用：发送请求信封，然后依次等待
//! ready / running / results 三个阶段信号，每个阶段有独立的超时预算。
//! 最坏阻塞时间是三个预算之和，而不是最大值。

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use matp_protocol::message::{keys, phase};
use matp_protocol::Envelope;

use crate::{ChannelConfig, Result, TimeoutPhase, TransportError};

/// 远端传输
///
/// 以信封为单位的底层收发接口。实现方保证一个信封要么完整送达
/// 要么整体失败，绝不向上交付半个信封。
#[async_trait]
pub trait RemoteTransport: Send {
    /// 发送一个请求信封
    async fn send(&mut self, envelope: &Envelope) -> Result<()>;

    /// 接收下一个信封
    async fn receive(&mut self) -> Result<Envelope>;
}

/// 远端通道
///
/// 同一条记录同一时刻只有一个在途调用，不支持流水线和并发调用。
pub struct RemoteChannel {
    /// 底层传输
    transport: Box<dyn RemoteTransport>,

    /// 通道配置（ready / running 预算）
    config: ChannelConfig,

    /// 关闭信号，阻塞等待期间收到信号必须立即解除阻塞
    shutdown: watch::Receiver<bool>,

    /// 无外部关闭信号时持有发送端，避免接收端立即报告通道关闭
    _shutdown_guard: Option<watch::Sender<bool>>,
}

impl RemoteChannel {
    /// 创建新的远端通道
    pub fn new(
        transport: Box<dyn RemoteTransport>,
        config: ChannelConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            config,
            shutdown,
            _shutdown_guard: None,
        }
    }

    /// 创建不关心关闭信号的通道（测试和一次性调用使用）
    pub fn without_shutdown(transport: Box<dyn RemoteTransport>, config: ChannelConfig) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut channel = Self::new(transport, config, rx);
        channel._shutdown_guard = Some(tx);
        channel
    }

    /// 执行一次同步远端调用
    ///
    /// `results_timeout` 是本次命令的完成预算，由引擎按关键字计算。
    /// 三个阶段任一超时返回 [`TransportError::Timeout`]，
    /// 远端异常返回 [`TransportError::RemoteApplication`]，
    /// 关闭信号返回 [`TransportError::Shutdown`]，全部向上传播。
    pub async fn call(
        &mut self,
        envelope: &Envelope,
        results_timeout: Duration,
    ) -> Result<Envelope> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Shutdown);
        }

        debug!(
            "发送远端调用: target={:?} command={:?}",
            envelope.get(keys::TARGET),
            envelope.get(keys::COMMAND)
        );
        self.transport.send(envelope).await?;

        let ready_budget = self.config.ready_timeout();
        let running_budget = self.config.running_timeout();

        self.await_phase(phase::READY, ready_budget, TimeoutPhase::Ready)
            .await?;
        self.await_phase(phase::RUNNING, running_budget, TimeoutPhase::Running)
            .await?;
        let result = self
            .await_phase(phase::RESULTS, results_timeout, TimeoutPhase::Results)
            .await?;

        debug!("远端调用完成: {} 个结果字段", result.len());
        Ok(result)
    }

    /// 在预算内等待一个指定阶段的信封
    async fn await_phase(
        &mut self,
        expected: &str,
        budget: Duration,
        which: TimeoutPhase,
    ) -> Result<Envelope> {
        let deadline = Instant::now() + budget;
        let Self {
            transport,
            shutdown,
            ..
        } = self;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let envelope = tokio::select! {
                changed = shutdown.changed() => {
                    // 发送端被丢弃也视为关闭
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(TransportError::Shutdown);
                    }
                    continue;
                }
                received = timeout(remaining, transport.receive()) => match received {
                    Ok(Ok(envelope)) => envelope,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(TransportError::Timeout(which)),
                },
            };

            match envelope.get(keys::PHASE) {
                Some(p) if p == phase::EXCEPTION => {
                    let msg = envelope
                        .get(keys::EXCEPTION_MSG)
                        .unwrap_or("远端未提供异常信息")
                        .to_string();
                    return Err(TransportError::RemoteApplication(msg));
                }
                Some(p) if p == expected => return Ok(envelope),
                other => {
                    // 乱序或未知的阶段信号不计入本阶段，继续等待
                    warn!("等待 {} 阶段时收到意外信封: phase={:?}", which, other);
                }
            }
        }
    }
}
