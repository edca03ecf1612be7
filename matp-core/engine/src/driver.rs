//! 驱动命令处理器
//!
//! 处理不针对具体 GUI 组件的驱动级关键字：条件跳转、等待 GUI、
//! 剪贴板操作、截屏和软键盘控制。验证顺序固定：先参数数量，
//! 再参数值，最后识别串解析，任何一步失败都不做远端调用。

use tracing::debug;

use matp_common::{ExecutionStatus, StatusCode, TestRecord};
use matp_protocol::message::keys;
use matp_protocol::{target, Envelope, TranslatedResult};

use crate::context::EngineContext;
use crate::processor::{
    classify_transport_error, dispatch_remote, issue_failure, issue_param_count_failure,
    issue_param_value_failure, issue_remote_failure, issue_success, issue_warning,
    parse_timeout_param, KeywordProcessor,
};

/// 关键字未提供超时参数时的默认预算（秒）
const DEFAULT_KEYWORD_TIMEOUT: u64 = 15;

/// 驱动命令关键字（全部小写）
mod commands {
    pub const ON_GUI_EXISTS_GOTO_BLOCKID: &str = "onguiexistsgotoblockid";
    pub const ON_GUI_NOT_EXIST_GOTO_BLOCKID: &str = "onguinotexistgotoblockid";
    pub const WAIT_FOR_GUI: &str = "waitforgui";
    pub const WAIT_FOR_GUI_GONE: &str = "waitforguigone";
    pub const CLEAR_CLIPBOARD: &str = "clearclipboard";
    pub const SET_CLIPBOARD: &str = "setclipboard";
    pub const ASSIGN_CLIPBOARD_VARIABLE: &str = "assignclipboardvariable";
    pub const TAKE_SCREENSHOT: &str = "takescreenshot";
    pub const HIDE_SOFT_KEYBOARD: &str = "hidesoftkeyboard";
    pub const SHOW_SOFT_KEYBOARD: &str = "showsoftkeyboard";
    pub const CLEAR_APP_MAP_CACHE: &str = "clearappmapcache";
}

const CLAIMED: &[&str] = &[
    commands::ON_GUI_EXISTS_GOTO_BLOCKID,
    commands::ON_GUI_NOT_EXIST_GOTO_BLOCKID,
    commands::WAIT_FOR_GUI,
    commands::WAIT_FOR_GUI_GONE,
    commands::CLEAR_CLIPBOARD,
    commands::SET_CLIPBOARD,
    commands::ASSIGN_CLIPBOARD_VARIABLE,
    commands::TAKE_SCREENSHOT,
    commands::HIDE_SOFT_KEYBOARD,
    commands::SHOW_SOFT_KEYBOARD,
    commands::CLEAR_APP_MAP_CACHE,
];

/// 驱动命令处理器
#[derive(Debug)]
pub struct DriverCommandProcessor;

impl DriverCommandProcessor {
    pub fn new() -> Self {
        Self
    }

    /// 条件跳转：param1=块 ID，param2=窗口名，param3=组件名，param4=可选超时
    ///
    /// 远端 OK 表示条件成立，本地状态置为跳转并把块 ID 放进 detail；
    /// 远端 WARN 表示条件不成立，是普通的通过，不跳转。
    async fn handle_gui_branch(&self, record: &mut TestRecord, ctx: &EngineContext, exists: bool) {
        if record.params.len() < 3 {
            issue_param_count_failure(record);
            return;
        }
        let block_id = record.params[0].trim().to_string();
        let window_name = record.params[1].trim().to_string();
        let component_name = record.params[2].trim().to_string();
        if block_id.is_empty() {
            issue_param_value_failure(record, "blockId");
            return;
        }
        if window_name.is_empty() {
            issue_param_value_failure(record, "windowId");
            return;
        }
        if component_name.is_empty() {
            issue_param_value_failure(record, "componentId");
            return;
        }
        let timeout = parse_timeout_param(&record.params, 3, DEFAULT_KEYWORD_TIMEOUT);

        record.window_name = window_name;
        record.component_name = component_name;
        ctx.resolve_recognition(record);

        let envelope = build_component_envelope(record, timeout);
        let budget = ctx.config.results_timeout(timeout);
        let outcome = match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => outcome,
            Err(e) => {
                classify_transport_error(record, &e);
                return;
            }
        };

        match outcome.translated.status.code {
            StatusCode::NoFailure => {
                let comment = message_text(&outcome.translated).unwrap_or_else(|| {
                    if exists {
                        format!("组件 {} 存在，跳转到块 {}", record.component_name, block_id)
                    } else {
                        format!("组件 {} 不存在，跳转到块 {}", record.component_name, block_id)
                    }
                });
                debug!("{} 条件成立，跳转到块 {}", record.command, block_id);
                record.status = ExecutionStatus {
                    code: StatusCode::BranchToBlock,
                    comment: Some(comment),
                    detail: Some(block_id),
                };
                record.processed = true;
            }
            // 条件不成立：普通通过，不跳转
            StatusCode::Warning => {
                let comment = message_text(&outcome.translated)
                    .unwrap_or_else(|| format!("{} 条件不成立，不跳转", record.command));
                issue_success(record, comment);
            }
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }

    /// 等待 GUI 出现/消失：param1=窗口名，param2=组件名，param3=可选超时
    async fn handle_wait_for_gui(&self, record: &mut TestRecord, ctx: &EngineContext, gone: bool) {
        if record.params.len() < 2 {
            issue_param_count_failure(record);
            return;
        }
        let window_name = record.params[0].trim().to_string();
        let component_name = record.params[1].trim().to_string();
        if window_name.is_empty() {
            issue_param_value_failure(record, "windowId");
            return;
        }
        if component_name.is_empty() {
            issue_param_value_failure(record, "componentId");
            return;
        }
        let timeout = parse_timeout_param(&record.params, 2, DEFAULT_KEYWORD_TIMEOUT);

        record.window_name = window_name;
        record.component_name = component_name;
        ctx.resolve_recognition(record);

        let envelope = build_component_envelope(record, timeout);
        let budget = ctx.config.results_timeout(timeout);
        let outcome = match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => outcome,
            Err(e) => {
                classify_transport_error(record, &e);
                return;
            }
        };

        match outcome.translated.status.code {
            StatusCode::NoFailure => {
                let comment = message_text(&outcome.translated).unwrap_or_else(|| {
                    if gone {
                        format!("组件 {} 在 {} 秒内消失", record.component_name, timeout)
                    } else {
                        format!("组件 {} 在 {} 秒内出现", record.component_name, timeout)
                    }
                });
                issue_success(record, comment);
            }
            StatusCode::Warning => {
                let comment = message_text(&outcome.translated).unwrap_or_else(|| {
                    if gone {
                        format!("组件 {} 在 {} 秒内未消失", record.component_name, timeout)
                    } else {
                        format!("组件 {} 在 {} 秒内未出现", record.component_name, timeout)
                    }
                });
                issue_warning(record, comment);
            }
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }

    /// 无参数命令：清空剪贴板、软键盘控制、清空应用映射缓存
    async fn handle_no_param(&self, record: &mut TestRecord, ctx: &EngineContext) {
        let envelope = Envelope::build(
            target::DRIVER,
            &canonical(&record.command),
            &record.params,
            DEFAULT_KEYWORD_TIMEOUT,
        );
        let budget = ctx.config.results_timeout(DEFAULT_KEYWORD_TIMEOUT);
        let command = record.command.clone();
        match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => {
                apply_plain_outcome(record, &outcome.translated, || {
                    format!("{command} 执行成功")
                });
            }
            Err(e) => classify_transport_error(record, &e),
        }
    }

    /// 设置剪贴板内容：param1=要写入的文本
    async fn handle_set_clipboard(&self, record: &mut TestRecord, ctx: &EngineContext) {
        if record.params.is_empty() {
            issue_param_count_failure(record);
            return;
        }
        if record.params[0].is_empty() {
            issue_param_value_failure(record, "value");
            return;
        }
        let envelope = Envelope::build(
            target::DRIVER,
            &canonical(&record.command),
            &record.params,
            DEFAULT_KEYWORD_TIMEOUT,
        );
        let budget = ctx.config.results_timeout(DEFAULT_KEYWORD_TIMEOUT);
        match dispatch_remote(ctx, &envelope, budget).await {
            Ok(outcome) => {
                apply_plain_outcome(record, &outcome.translated, || {
                    "剪贴板内容已设置".to_string()
                });
            }
            Err(e) => classify_transport_error(record, &e),
        }
    }

    /// 读取剪贴板并赋值给驱动变量：param1=变量名
    async fn handle_assign_clipboard_variable(
        &self,
        record: &mut TestRecord,
        ctx: &EngineContext,
    ) {
        if record.params.is_empty() {
            issue_param_count_failure(record);
            return;
        }
        let variable = record.params[0].trim().to_string();
        if variable.is_empty() {
            issue_param_value_failure(record, "variableName");
            return;
        }
        let envelope = Envelope::build(
            target::DRIVER,
            &canonical(&record.command),
            &record.params,
            DEFAULT_KEYWORD_TIMEOUT,
        );
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
                // 剪贴板内容通过结果信息字段带回
                let content = outcome.result.get_str(keys::REMOTE_RESULT_INFO, "");
                if ctx.vars.set(&variable, &content) {
                    issue_success(record, format!("剪贴板内容已赋值给变量 {variable}"));
                } else {
                    issue_failure(record, format!("变量 {variable} 写入失败"));
                }
            }
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }

    /// 截屏：param1=文件名；旋转角度通过结果信息字段带回
    ///
    /// 实际的截图落盘由外部协作者完成，这里只发起远端捕获并记录结果。
    async fn handle_take_screenshot(&self, record: &mut TestRecord, ctx: &EngineContext) {
        if record.params.is_empty() {
            issue_param_count_failure(record);
            return;
        }
        let filename = record.params[0].trim().to_string();
        if filename.is_empty() {
            issue_param_value_failure(record, "fileName");
            return;
        }
        let envelope = Envelope::build(
            target::DRIVER,
            &canonical(&record.command),
            &record.params,
            DEFAULT_KEYWORD_TIMEOUT,
        );
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
                let rotation = outcome.result.get_int(keys::REMOTE_RESULT_INFO, 0);
                record.status = ExecutionStatus::with_detail(
                    StatusCode::NoFailure,
                    format!("截屏完成: {filename}"),
                    rotation.to_string(),
                );
                record.processed = true;
            }
            StatusCode::NotExecuted => record.reset_status(),
            _ => issue_remote_failure(record, &outcome.translated),
        }
    }
}

impl Default for DriverCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KeywordProcessor for DriverCommandProcessor {
    fn name(&self) -> &'static str {
        "driver_command_processor"
    }

    fn claims(&self, command: &str) -> bool {
        let lowered = command.to_ascii_lowercase();
        CLAIMED.contains(&lowered.as_str())
    }

    async fn process(&self, record: &mut TestRecord, ctx: &EngineContext) {
        match canonical(&record.command).as_str() {
            commands::ON_GUI_EXISTS_GOTO_BLOCKID => {
                self.handle_gui_branch(record, ctx, true).await
            }
            commands::ON_GUI_NOT_EXIST_GOTO_BLOCKID => {
                self.handle_gui_branch(record, ctx, false).await
            }
            commands::WAIT_FOR_GUI => self.handle_wait_for_gui(record, ctx, false).await,
            commands::WAIT_FOR_GUI_GONE => self.handle_wait_for_gui(record, ctx, true).await,
            commands::SET_CLIPBOARD => self.handle_set_clipboard(record, ctx).await,
            commands::ASSIGN_CLIPBOARD_VARIABLE => {
                self.handle_assign_clipboard_variable(record, ctx).await
            }
            commands::TAKE_SCREENSHOT => self.handle_take_screenshot(record, ctx).await,
            commands::CLEAR_CLIPBOARD
            | commands::HIDE_SOFT_KEYBOARD
            | commands::SHOW_SOFT_KEYBOARD
            | commands::CLEAR_APP_MAP_CACHE => self.handle_no_param(record, ctx).await,
            // claims 和 process 的命令集合一致，这里不可达
            _ => {}
        }
    }
}

/// 命令名的规范形式（小写）
fn canonical(command: &str) -> String {
    command.to_ascii_lowercase()
}

/// 主消息描述符的展示文本
fn message_text(translated: &TranslatedResult) -> Option<String> {
    translated
        .message
        .as_ref()
        .and_then(|m| m.display_text())
        .map(str::to_string)
}

/// 构造携带窗口/组件字段的请求信封
fn build_component_envelope(record: &TestRecord, timeout: u64) -> Envelope {
    let mut envelope = Envelope::build(
        target::DRIVER,
        &canonical(&record.command),
        &record.params,
        timeout,
    );
    envelope.set(keys::WINNAME, record.window_name.as_str());
    envelope.set(keys::COMPNAME, record.component_name.as_str());
    envelope.set(keys::WINREC, record.window_rec.as_deref().unwrap_or(""));
    envelope.set(keys::COMPREC, record.component_rec.as_deref().unwrap_or(""));
    envelope
}

/// 套用无特殊结果数据的命令的翻译结果
fn apply_plain_outcome(
    record: &mut TestRecord,
    translated: &TranslatedResult,
    default_comment: impl FnOnce() -> String,
) {
    match translated.status.code {
        StatusCode::NoFailure => {
            let comment = message_text(translated).unwrap_or_else(default_comment);
            issue_success(record, comment);
        }
        StatusCode::Warning => {
            let comment =
                message_text(translated).unwrap_or_else(|| format!("{} 有警告", record.command));
            issue_warning(record, comment);
        }
        StatusCode::NotExecuted => record.reset_status(),
        _ => issue_remote_failure(record, translated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::context::{InMemoryAppMap, InMemoryVariableStore};
    use crate::EngineConfig;
    use matp_transport::{ChannelConfig, RemoteChannel, RemoteTransport, TcpTransport};

    fn offline_ctx() -> EngineContext {
        let transport: Box<dyn RemoteTransport> = Box::new(TcpTransport::new());
        EngineContext::new(
            RemoteChannel::without_shutdown(transport, ChannelConfig::default()),
            Arc::new(InMemoryAppMap::new()),
            Arc::new(InMemoryVariableStore::new()),
            EngineConfig::default(),
        )
    }

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_claims_are_case_insensitive() {
        let processor = DriverCommandProcessor::new();
        assert!(processor.claims("OnGuiExistsGotoBlockID"));
        assert!(processor.claims("WAITFORGUI"));
        assert!(processor.claims("takescreenshot"));
        assert!(!processor.claims("Click"));
        assert!(!processor.claims("GetCurrentWindow"));
    }

    #[tokio::test]
    async fn test_branch_with_missing_params_fails_without_remote_call() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        // 三个必需参数只给了两个
        let mut record = TestRecord::driver_command(
            "OnGuiExistsGotoBlockID",
            params(&["B1", "LoginWin"]),
        );
        processor.process(&mut record, &ctx).await;

        assert_eq!(record.status.code, StatusCode::GeneralFailure);
        assert!(record.is_record_processed());
        assert!(record.status.comment.as_deref().unwrap().contains("参数数量"));
    }

    #[tokio::test]
    async fn test_branch_with_empty_block_id_fails_without_remote_call() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        let mut record = TestRecord::driver_command(
            "OnGuiExistsGotoBlockID",
            params(&["  ", "LoginWin", "OkButton"]),
        );
        processor.process(&mut record, &ctx).await;

        assert_eq!(record.status.code, StatusCode::GeneralFailure);
        assert!(record.status.comment.as_deref().unwrap().contains("blockId"));
    }

    #[tokio::test]
    async fn test_wait_for_gui_requires_two_params() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        let mut record = TestRecord::driver_command("WaitForGui", params(&["LoginWin"]));
        processor.process(&mut record, &ctx).await;
        assert_eq!(record.status.code, StatusCode::GeneralFailure);
    }

    #[tokio::test]
    async fn test_set_clipboard_rejects_empty_value() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        let mut record = TestRecord::driver_command("SetClipboard", params(&[""]));
        processor.process(&mut record, &ctx).await;
        assert_eq!(record.status.code, StatusCode::GeneralFailure);
        assert!(record.status.comment.as_deref().unwrap().contains("value"));
    }

    #[tokio::test]
    async fn test_assign_clipboard_variable_requires_name() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        let mut record = TestRecord::driver_command("AssignClipboardVariable", vec![]);
        processor.process(&mut record, &ctx).await;
        assert_eq!(record.status.code, StatusCode::GeneralFailure);
    }

    #[tokio::test]
    async fn test_take_screenshot_requires_filename() {
        let processor = DriverCommandProcessor::new();
        let ctx = offline_ctx();

        let mut record = TestRecord::driver_command("TakeScreenshot", params(&["  "]));
        processor.process(&mut record, &ctx).await;
        assert_eq!(record.status.code, StatusCode::GeneralFailure);
        assert!(record.status.comment.as_deref().unwrap().contains("fileName"));
    }
}
