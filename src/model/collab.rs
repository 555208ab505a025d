//! 协作服务边界：AI 修复 / 类型生成的请求参数与回复清洗
//!
//! 真正的网络调用在核心之外执行；核心只定义契约、
//! 固定确定性参数，并对回复做防御性整理

/// 协作动作种类；会话按种类各自保证同一时刻至多一个在途请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollabKind {
    Repair,
    Codegen,
}

/// 协作服务回复：成功内容或错误消息（可能为空）
pub type CollabReply = Result<String, String>;

/// 温度固定为最小值，保证同一输入重复修复的结果稳定
pub const COLLAB_TEMPERATURE: f32 = 0.0;

/// 回复失败且未附带消息时的兜底文案
pub const DEFAULT_COLLAB_ERROR: &str = "协作服务未返回内容";

pub const REPAIR_PROMPT: &str =
    "修复下面的文本，使其成为合法 JSON。只输出修复后的 JSON 本身，不要任何包装标记。";

pub const CODEGEN_PROMPT: &str =
    "根据下面的 JSON 生成静态类型接口声明：顶层类型命名为 Root，所有字段标记为只读。只输出声明文本。";

/// 发往协作服务的请求负载
#[derive(Debug, Clone)]
pub struct CollabRequest {
    pub kind: CollabKind,
    pub prompt: &'static str,
    /// 当前缓冲全文
    pub input: String,
    pub temperature: f32,
}

impl CollabRequest {
    pub fn repair(input: String) -> Self {
        Self {
            kind: CollabKind::Repair,
            prompt: REPAIR_PROMPT,
            input,
            temperature: COLLAB_TEMPERATURE,
        }
    }

    pub fn codegen(input: String) -> Self {
        Self {
            kind: CollabKind::Codegen,
            prompt: CODEGEN_PROMPT,
            input,
            temperature: COLLAB_TEMPERATURE,
        }
    }
}

/// 防御性剥离回复首尾的代码围栏（首行可带语言标记）
pub fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if matches!(lines.last(), Some(l) if l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}
