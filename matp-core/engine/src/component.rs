//! 组件命令路由处理器
//!
//! 链尾的宽泛兜底：认领所有命令，把测试步骤连同窗口/组件识别串
//! 原样转发给远端的组件处理家族。远端返回"未执行"时记录保持
//! 未认领状态，由驱动循环转交下一个引擎。

use matp_common::{ExecutionStatus, StatusCode, TestRecord};
use matp_protocol::message::keys;
use matp_protocol::{target, Envelope};

use crate::context::EngineContext;
use crate::processor::{
    classify_transport_error, dispatch_remote, issue_remote_failure, issue_warning,
    KeywordProcessor,
};

/// 组件命令的默认关键字预算（秒）
const DEFAULT_KEYWORD_TIMEOUT: u64 = 30;

/// 组件命令路由处理器
#[derive(Debug)]
pub struct ComponentCommandProcessor;

impl ComponentCommandProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ComponentCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KeywordProcessor for ComponentCommandProcessor {
    fn name(&self) -> &'static str {
        "component_command_processor"
    }

    /// 兜底处理器认领一切命令
    fn claims(&self, _command: &str) -> bool {
        true
    }

    async fn process(&self, record: &mut TestRecord, ctx: &EngineContext) {
        // 上游处理器可能未解析过识别串
        if record.window_rec.is_none() || record.component_rec.is_none() {
            ctx.resolve_recognition(record);
        }

        let command = record.command.to_ascii_lowercase();
        let mut envelope = Envelope::build(
            target::COMP_ROUTING,
            &command,
            &record.params,
            DEFAULT_KEYWORD_TIMEOUT,
        );
        envelope.set(keys::WINNAME, record.window_name.as_str());
        envelope.set(keys::COMPNAME, record.component_name.as_str());
        envelope.set(keys::WINREC, record.window_rec.as_deref().unwrap_or(""));
        envelope.set(keys::COMPREC, record.component_rec.as_deref().unwrap_or(""));

        let budget = ctx.config.results_timeout(DEFAULT_KEYWORD_TIMEOUT);
        let outcome = match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => outcome,
            Err(e) => {
                classify_transport_error(record, &e);
                return;
            }
        };

        match outcome.translated.status.code {
            StatusCode::NoFailure => {
                let comment = outcome
                    .translated
                    .status
                    .comment
                    .clone()
                    .unwrap_or_else(|| {
                        format!("{} {} {} 执行成功", record.window_name, record.component_name, command)
                    });
                record.status = ExecutionStatus {
                    code: StatusCode::NoFailure,
                    comment: Some(comment),
                    detail: outcome.translated.status.detail.clone(),
                };
                record.processed = true;
            }
            StatusCode::Warning => {
                let comment = outcome
                    .translated
                    .status
                    .comment
                    .clone()
                    .unwrap_or_else(|| format!("{command} 有警告"));
                issue_warning(record, comment);
            }
            // 远端不认识此命令：记录保持未认领，由驱动循环转交下一个引擎
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }
}
