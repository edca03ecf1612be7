//! 关键字处理器接口与公共结果处理
//!
//! 每个处理器大小写不敏感地认领自己的关键字子集，执行后设置终态状态码。
//! 失败在处理器边界被恢复：一个关键字失败绝不中止整个运行。

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use matp_common::{ExecutionStatus, StatusCode, TestRecord};
use matp_protocol::{translate, Envelope, RemoteResult, TranslatedResult};
use matp_transport::TransportError;

use crate::context::EngineContext;

/// 关键字处理器
///
/// 链上按序求值的处理单元。处理器认领命令后必须设置终态状态，
/// 未认领的命令由链继续向后传递。
#[async_trait]
pub trait KeywordProcessor: std::fmt::Debug + Send + Sync {
    /// 处理器名称（日志用）
    fn name(&self) -> &'static str;

    /// 是否认领此命令（大小写不敏感）
    fn claims(&self, command: &str) -> bool;

    /// 处理记录，原地修改状态和处理标志
    async fn process(&self, record: &mut TestRecord, ctx: &EngineContext);
}

/// 一次远端调用的完整产出
pub struct RemoteOutcome {
    /// 类型化结果视图
    pub result: RemoteResult,

    /// 翻译后的状态与消息描述符
    pub translated: TranslatedResult,
}

/// 执行一次远端调用并翻译结果
///
/// 这是处理器的唯一挂起点；调用期间通道被独占，不存在并发调用。
pub(crate) async fn dispatch_remote(
    ctx: &EngineContext,
    envelope: &Envelope,
    results_timeout: Duration,
) -> Result<RemoteOutcome, TransportError> {
    let mut channel = ctx.channel.lock().await;
    let response = channel.call(envelope, results_timeout).await?;
    drop(channel);

    let result = RemoteResult::new(response);
    let translated = translate(&result);
    debug!(
        "远端返回翻译为 {}",
        translated.status.code.display_name()
    );
    Ok(RemoteOutcome { result, translated })
}

/// 在处理器边界分类传输错误
///
/// 关闭信号翻译为未执行（驱动循环据此收尾），其余一律是一般性失败；
/// 任何一种都不允许被静默当作通过。
pub(crate) fn classify_transport_error(record: &mut TestRecord, err: &TransportError) {
    match err {
        TransportError::Shutdown => {
            warn!("{} 执行期间收到关闭信号", record.command);
            record.status = ExecutionStatus::new(StatusCode::NotExecuted);
            record.processed = false;
        }
        other => {
            warn!("{} 远端调用失败: {}", record.command, other);
            record.status =
                ExecutionStatus::with_comment(StatusCode::GeneralFailure, other.to_string());
            record.processed = true;
        }
    }
}

/// 参数数量不足，失败关闭，不做远端调用
pub(crate) fn issue_param_count_failure(record: &mut TestRecord) {
    record.status = ExecutionStatus::with_comment(
        StatusCode::GeneralFailure,
        format!("{}: 提供的参数数量不足", record.command),
    );
    record.processed = true;
}

/// 某个参数的值无效或缺失，失败关闭，不做远端调用
pub(crate) fn issue_param_value_failure(record: &mut TestRecord, param_name: &str) {
    record.status = ExecutionStatus::with_comment(
        StatusCode::GeneralFailure,
        format!("{}: 参数 {} 的值无效或缺失", record.command, param_name),
    );
    record.processed = true;
}

/// 执行成功
pub(crate) fn issue_success(record: &mut TestRecord, comment: impl Into<String>) {
    record.status = ExecutionStatus::with_comment(StatusCode::NoFailure, comment);
    record.processed = true;
}

/// 执行完成但有警告
pub(crate) fn issue_warning(record: &mut TestRecord, comment: impl Into<String>) {
    record.status = ExecutionStatus::with_comment(StatusCode::Warning, comment);
    record.processed = true;
}

/// 执行失败
pub(crate) fn issue_failure(record: &mut TestRecord, comment: impl Into<String>) {
    record.status = ExecutionStatus::with_comment(StatusCode::GeneralFailure, comment);
    record.processed = true;
}

/// 远端报告失败时落盘失败状态
///
/// 有本地化消息描述符时使用其文本，否则从状态码合成通用消息。
pub(crate) fn issue_remote_failure(record: &mut TestRecord, translated: &TranslatedResult) {
    let comment = translated
        .message
        .as_ref()
        .and_then(|m| m.display_text())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{} 失败，远端状态: {}，信息: {}",
                record.command,
                translated.status.code.display_name(),
                translated.status.detail.as_deref().unwrap_or("")
            )
        });
    let detail = translated
        .detail_message
        .as_ref()
        .and_then(|m| m.display_text())
        .map(str::to_string);

    record.status = ExecutionStatus {
        code: StatusCode::GeneralFailure,
        comment: Some(comment),
        detail,
    };
    record.processed = true;
}

/// 解析可选的超时参数
///
/// 负值钳制回默认值，非数字输入静默回落到默认值。
pub(crate) fn parse_timeout_param(params: &[String], index: usize, default: u64) -> u64 {
    let Some(raw) = params.get(index) else {
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => value as u64,
        Ok(value) => {
            debug!("忽略无效的超时值: {}", value);
            default
        }
        Err(_) => {
            debug!("忽略非数字的超时值: {:?}", raw);
            default
        }
    }
}
