//! 引擎检查命令处理器
//!
//! 处理远端对象树的检查类关键字（取窗口、取属性、匹配搜索等）。
//! 每个命令属于一个固定超时类（15 秒 / 60 秒 / 120 秒），固定类
//! 直接使用类内预算，不走通用超时公式。最近一次命令的状态通过
//! 变量存储发布，脚本可以在下一步读取。

use std::time::Duration;

use tracing::debug;

use matp_common::{ExecutionStatus, StatusCode, TestRecord};
use matp_protocol::{target, Envelope};

use crate::context::EngineContext;
use crate::processor::{
    classify_transport_error, dispatch_remote, issue_param_count_failure, issue_remote_failure,
    issue_warning, KeywordProcessor,
};

/// 发布执行状态的驱动变量名
mod vars {
    /// 最近一次引擎命令
    pub const ENGINE_COMMAND: &str = "Engine.Command";
    /// 最近一次命令的状态码显示名称
    pub const ENGINE_STATUS_CODE: &str = "Engine.StatusCode";
    /// 最近一次命令的结果信息
    pub const ENGINE_STATUS_INFO: &str = "Engine.StatusInfo";
}

/// 一个命令的超时类与参数要求
#[derive(Debug, Clone, Copy)]
struct CommandClass {
    /// 固定完成预算（秒）
    budget_secs: u64,

    /// 必需参数数量
    required_params: usize,
}

/// 命令到超时类的固定表
///
/// 三个超时类（15/60/120 秒）按原样保留，不归并为单一规则。
fn classify(command: &str) -> Option<CommandClass> {
    const SHORT: u64 = 15;
    const MEDIUM: u64 = 60;
    const LONG: u64 = 120;

    let class = match command {
        // 15 秒类：无参数的窗口级查询
        "getcurrentwindow" | "gettoplevelcount" | "gettoplevelwindows"
        | "clearhighlighteddialog" => CommandClass {
            budget_secs: SHORT,
            required_params: 0,
        },
        // 15 秒类：单参数的对象查询
        "getaccessiblename" | "getcaption" | "getchildcount" | "getchildren"
        | "getclassindex" | "getclassname" | "getid" | "getname" | "getnonaccessiblename"
        | "getpropertynames" | "getsuperclassnames" | "gettext" | "isenabled" | "isshowing"
        | "isvalid" | "istoplevelpopupcontainer" | "setactivewindow" => CommandClass {
            budget_secs: SHORT,
            required_params: 1,
        },
        // 15 秒类：双参数的对象查询
        "getproperty" | "highlightmatchingchildobjectbykey" => CommandClass {
            budget_secs: SHORT,
            required_params: 2,
        },
        // 60 秒类：双参数的匹配搜索
        "ismatchingpath" | "getmatchingchildobjects" | "getmatchingpathobject" => CommandClass {
            budget_secs: MEDIUM,
            required_params: 2,
        },
        // 120 秒类：向上遍历祖先链
        "getmatchingparentobject" => CommandClass {
            budget_secs: LONG,
            required_params: 1,
        },
        _ => return None,
    };
    Some(class)
}

/// 引擎检查命令处理器
#[derive(Debug)]
pub struct EngineCommandProcessor;

impl EngineCommandProcessor {
    pub fn new() -> Self {
        Self
    }

    /// 重置发布变量，随后发生的任何失败都不会留下上一次的残值
    fn reset_published_vars(&self, ctx: &EngineContext, command: &str) {
        ctx.vars.set(vars::ENGINE_COMMAND, command);
        ctx.vars.set(
            vars::ENGINE_STATUS_CODE,
            StatusCode::IgnoreReturnCode.display_name(),
        );
        ctx.vars.set(vars::ENGINE_STATUS_INFO, "");
    }

    /// 发布最近一次命令的翻译后状态
    fn publish_status(&self, ctx: &EngineContext, status: &ExecutionStatus) {
        ctx.vars
            .set(vars::ENGINE_STATUS_CODE, status.code.display_name());
        ctx.vars.set(
            vars::ENGINE_STATUS_INFO,
            status.detail.as_deref().unwrap_or(""),
        );
    }
}

impl Default for EngineCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KeywordProcessor for EngineCommandProcessor {
    fn name(&self) -> &'static str {
        "engine_command_processor"
    }

    fn claims(&self, command: &str) -> bool {
        classify(&command.to_ascii_lowercase()).is_some()
    }

    async fn process(&self, record: &mut TestRecord, ctx: &EngineContext) {
        let command = record.command.to_ascii_lowercase();
        let Some(class) = classify(&command) else {
            // claims 和 classify 的命令集合一致，这里不可达
            return;
        };

        self.reset_published_vars(ctx, &command);

        if record.params.len() < class.required_params {
            issue_param_count_failure(record);
            return;
        }

        let envelope = Envelope::build(target::ENGINE, &command, &record.params, class.budget_secs);
        // 固定超时类直接使用类内预算，不走通用公式
        let budget = Duration::from_secs(class.budget_secs);
        debug!("引擎命令 {} 使用 {} 秒固定预算", command, class.budget_secs);

        let outcome = match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => outcome,
            Err(e) => {
                classify_transport_error(record, &e);
                self.publish_status(ctx, &record.status);
                return;
            }
        };

        self.publish_status(ctx, &outcome.translated.status);

        match outcome.translated.status.code {
            StatusCode::NoFailure => {
                let info = outcome.translated.status.detail.clone();
                record.status = ExecutionStatus {
                    code: StatusCode::NoFailure,
                    comment: Some(format!("{command} 执行成功")),
                    detail: info,
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
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }
}
