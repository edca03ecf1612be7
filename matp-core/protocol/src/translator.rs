//! 结果翻译器
//!
//! 把远端结果码和标志映射为本地状态分类，并提取本地化消息描述符。
//! 映射是刻意保守的：无法识别的远端结果码绝不会变成成功。

use tracing::debug;

use matp_common::{ExecutionStatus, StatusCode};

use crate::message::keys;
use crate::result::RemoteResult;
use crate::remote_code;

/// 本地化消息描述符
///
/// 远端以资源包名称 + 键 + 有序参数 + 可选替代文本的形式返回消息。
/// 资源包的实际解析属于外部日志协作者，这里只携带描述符。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    /// 资源包名称
    pub bundle: Option<String>,

    /// 消息在资源包中的键
    pub key: String,

    /// 有序的消息参数
    pub params: Vec<String>,

    /// 替代文本（资源包不可用时的展示文本）
    pub alt_text: Option<String>,
}

impl MessageDescriptor {
    /// 取可直接展示的文本，目前即替代文本
    pub fn display_text(&self) -> Option<&str> {
        self.alt_text.as_deref()
    }
}

/// 一次远端调用的完整翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedResult {
    /// 翻译后的执行状态
    pub status: ExecutionStatus,

    /// 主消息描述符（缺失不是错误，调用方自行合成通用消息）
    pub message: Option<MessageDescriptor>,

    /// 详情消息描述符
    pub detail_message: Option<MessageDescriptor>,
}

/// 远端结果码到本地状态码的固定映射表
///
/// 两套编码互不兼容，表外的任何值一律映射为 `GeneralFailure`。
fn convert_remote_code(code: i64) -> StatusCode {
    match code {
        remote_code::NOT_EXECUTED => StatusCode::NotExecuted,
        remote_code::OK => StatusCode::NoFailure,
        remote_code::WARN => StatusCode::Warning,
        _ => StatusCode::GeneralFailure,
    }
}

/// 翻译一个远端结果
///
/// 翻译是幂等的：对同一个结果重复调用得到完全相同的执行状态。
pub fn translate(result: &RemoteResult) -> TranslatedResult {
    // isremoteresult 缺失或为 false 时，其余结果字段一概不可信
    if !result.is_remote_result() {
        debug!("返回信封未声明远端结果，状态保持未执行");
        return TranslatedResult {
            status: ExecutionStatus::new(StatusCode::NotExecuted),
            message: None,
            detail_message: None,
        };
    }

    let raw_code = result.get_int(keys::REMOTE_RESULT_CODE, remote_code::NOT_EXECUTED);
    let code = convert_remote_code(raw_code);
    // get_str 已把协议空值字面量改写为驱动侧哨兵
    let info = result.get_str(keys::REMOTE_RESULT_INFO, "");
    debug!("远端结果码 {} 翻译为 {}", raw_code, code.display_name());

    let message = extract_descriptor(
        result,
        keys::BUNDLE_NAME_FOR_MSG,
        keys::BUNDLE_KEY_FOR_MSG,
        keys::BUNDLE_PARAMS_FOR_MSG,
        keys::BUNDLE_ALTTEXT_FOR_MSG,
    );
    let detail_message = extract_descriptor(
        result,
        keys::BUNDLE_NAME_FOR_DETAIL,
        keys::BUNDLE_KEY_FOR_DETAIL,
        keys::BUNDLE_PARAMS_FOR_DETAIL,
        keys::BUNDLE_ALTTEXT_FOR_DETAIL,
    );

    let status = ExecutionStatus {
        code,
        comment: message.as_ref().and_then(|m| m.alt_text.clone()),
        detail: if info.is_empty() { None } else { Some(info) },
    };

    TranslatedResult {
        status,
        message,
        detail_message,
    }
}

/// 提取一个消息描述符，键缺失时返回 None
fn extract_descriptor(
    result: &RemoteResult,
    name_key: &str,
    key_key: &str,
    params_key: &str,
    alttext_key: &str,
) -> Option<MessageDescriptor> {
    let key = result.get_opt_str(key_key)?;
    let bundle = result.get_opt_str(name_key);
    let params = result
        .get_opt_str(params_key)
        .map(|delimited| parse_delimited_params(&delimited))
        .unwrap_or_default();
    let alt_text = result.get_opt_str(alttext_key);

    Some(MessageDescriptor {
        bundle,
        key,
        params,
        alt_text,
    })
}

/// 解析参数列表：首字符是分隔符，其余为分隔的参数
fn parse_delimited_params(delimited: &str) -> Vec<String> {
    let mut chars = delimited.chars();
    let Some(delimiter) = chars.next() else {
        return Vec::new();
    };
    let rest = chars.as_str();
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split(delimiter).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;
    use matp_common::DRIVER_NULL;

    fn remote(pairs: &[(&str, &str)]) -> RemoteResult {
        let mut envelope = Envelope::new();
        for (k, v) in pairs {
            envelope.set(k, *v);
        }
        RemoteResult::new(envelope)
    }

    #[test]
    fn test_untrusted_result_stays_not_executed() {
        // isremoteresult 缺失
        let translated = translate(&remote(&[(keys::REMOTE_RESULT_CODE, "0")]));
        assert_eq!(translated.status.code, StatusCode::NotExecuted);
        assert!(translated.message.is_none());

        // isremoteresult 为 false
        let translated = translate(&remote(&[
            (keys::IS_REMOTE_RESULT, "false"),
            (keys::REMOTE_RESULT_CODE, "0"),
        ]));
        assert_eq!(translated.status.code, StatusCode::NotExecuted);
    }

    #[test]
    fn test_fixed_mapping_table() {
        let cases = [
            ("-1", StatusCode::NotExecuted),
            ("0", StatusCode::NoFailure),
            ("1", StatusCode::Warning),
            ("2", StatusCode::GeneralFailure),
        ];
        for (raw, expected) in cases {
            let translated = translate(&remote(&[
                (keys::IS_REMOTE_RESULT, "true"),
                (keys::REMOTE_RESULT_CODE, raw),
            ]));
            assert_eq!(translated.status.code, expected, "远端结果码: {raw}");
        }
    }

    #[test]
    fn test_unknown_codes_never_become_success() {
        for raw in ["3", "99", "-42", "1000000", "junk"] {
            let translated = translate(&remote(&[
                (keys::IS_REMOTE_RESULT, "true"),
                (keys::REMOTE_RESULT_CODE, raw),
            ]));
            let code = translated.status.code;
            assert_ne!(code, StatusCode::NoFailure, "远端结果码: {raw}");
            assert_ne!(code, StatusCode::Warning, "远端结果码: {raw}");
        }
    }

    #[test]
    fn test_missing_code_defaults_to_not_executed_sentinel() {
        let translated = translate(&remote(&[(keys::IS_REMOTE_RESULT, "true")]));
        assert_eq!(translated.status.code, StatusCode::NotExecuted);
    }

    #[test]
    fn test_null_marker_substituted_in_info() {
        let translated = translate(&remote(&[
            (keys::IS_REMOTE_RESULT, "true"),
            (keys::REMOTE_RESULT_CODE, "0"),
            (keys::REMOTE_RESULT_INFO, crate::NULL_VALUE),
        ]));
        assert_eq!(translated.status.detail.as_deref(), Some(DRIVER_NULL));
    }

    #[test]
    fn test_descriptor_extraction_with_delimited_params() {
        let translated = translate(&remote(&[
            (keys::IS_REMOTE_RESULT, "true"),
            (keys::REMOTE_RESULT_CODE, "0"),
            (keys::BUNDLE_KEY_FOR_MSG, "found_timeout"),
            (keys::BUNDLE_NAME_FOR_MSG, "generic_text"),
            (keys::BUNDLE_PARAMS_FOR_MSG, ";OkButton;15"),
            (keys::BUNDLE_ALTTEXT_FOR_MSG, "OkButton found within 15s"),
        ]));

        let message = translated.message.expect("应提取到主消息描述符");
        assert_eq!(message.key, "found_timeout");
        assert_eq!(message.bundle.as_deref(), Some("generic_text"));
        assert_eq!(message.params, vec!["OkButton", "15"]);
        assert_eq!(
            translated.status.comment.as_deref(),
            Some("OkButton found within 15s")
        );
        // 详情描述符缺失不是错误
        assert!(translated.detail_message.is_none());
    }

    #[test]
    fn test_translate_is_idempotent() {
        let result = remote(&[
            (keys::IS_REMOTE_RESULT, "true"),
            (keys::REMOTE_RESULT_CODE, "1"),
            (keys::REMOTE_RESULT_INFO, "not found"),
            (keys::BUNDLE_KEY_FOR_MSG, "not_found_timeout"),
        ]);
        let first = translate(&result);
        let second = translate(&result);
        assert_eq!(first, second);
    }
}
