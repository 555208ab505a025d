//! 格式引擎：解析、序列化、转义/反转义与分层恢复策略

use serde_json::Value;
use thiserror::Error;

/// 显示模式：原文 / 美化 / 结构树
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Raw,
    Pretty,
    Tree,
}

/// 解析错误：保留 serde_json 的消息与行列位置
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

/// 格式化/压缩的产物；recovered 表示经过了反转义恢复
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    pub text: String,
    pub recovered: bool,
}

/// 严格按标准 JSON 语法解析（无注释、无尾逗号、无裸键）
pub fn parse_text(text: &str) -> Result<Value, ParseError> {
    serde_json::from_str(text).map_err(ParseError::from)
}

/// 序列化：pretty 为 2 空格缩进每行一个成员，否则无多余空白。
/// 键序按插入序原样保留（preserve_order）
pub fn serialize_value(value: &Value, pretty: bool) -> String {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    // Value 的键总是字符串，序列化不会失败
    result.unwrap_or_default()
}

/// 格式化：解析成功则输出 pretty 文本；失败先走一次恢复再报首次错误
pub fn format_text(text: &str) -> Result<FormatOutcome, ParseError> {
    reformat(text, true)
}

/// 压缩：与 format 相同的恢复策略，成功后输出紧凑文本
pub fn minify_text(text: &str) -> Result<FormatOutcome, ParseError> {
    reformat(text, false)
}

fn reformat(text: &str, pretty: bool) -> Result<FormatOutcome, ParseError> {
    let first = match parse_text(text) {
        Ok(v) => {
            return Ok(FormatOutcome {
                text: serialize_value(&v, pretty),
                recovered: false,
            });
        }
        Err(e) => e,
    };

    // 恢复尝试：整体反转义后重试；恢复结果视为规范文本
    match parse_text(&unescape_text(text)) {
        Ok(v) => {
            tracing::info!("直接解析失败，反转义后恢复成功");
            Ok(FormatOutcome {
                text: serialize_value(&v, pretty),
                recovered: true,
            })
        }
        Err(second) => {
            // 两次都失败：只报告首次错误，二次错误仅记日志
            tracing::warn!("恢复尝试仍失败: {}", second);
            Err(first)
        }
    }
}

/// 将字面控制字符与引号转为转义文本形式。
/// 单趟扫描，反斜杠与其余替换同时处理，后插入的反斜杠不会被二次转义
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            other => out.push(other),
        }
    }
    out
}

/// escape_text 的逆变换。
/// 单趟从左到右扫描：`\\` 还原出的反斜杠不会再参与后续匹配，
/// 未知转义序列原样保留
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            // 末尾孤立反斜杠
            None => out.push('\\'),
        }
    }
    out
}
