//! 会话控制器：以原始文本缓冲为唯一事实来源，派生解析结果、
//! 选区与树视图，并对协作服务请求做在途门控
//!
//! 所有操作同步执行、单线程所有；协作调用本身在核心之外完成，
//! 会话只负责 begin/finish 配对与后到先得的结果应用

use std::path::Path;

use jsonpath_rust::JsonPath;
use serde_json::Value;
use thiserror::Error;

use crate::model::collab::{
    strip_code_fences, CollabReply, CollabRequest, DEFAULT_COLLAB_ERROR,
};
use crate::model::format::{self, FormatMode, ParseError};
use crate::model::tree_view::{DisplayRow, TreeViewState};
use crate::utils::fs::{read_text_file, ExportPayload};

/// 内置演示文档：会话创建时载入
pub const DEMO_DOCUMENT: &str = r#"{
  "name": "示例文档",
  "version": "1.0.0",
  "active": true,
  "tags": ["json", "编辑器"],
  "owner": {
    "id": 42,
    "email": "demo@example.com"
  },
  "history": []
}"#;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    /// 文本格式非法
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// 直接解析与反转义重试都失败；按约定只携带首次错误
    #[error("{0}")]
    RecoveryExhausted(ParseError),
    #[error("JSONPath错误: {0}")]
    JsonPath(String),
    /// 协作服务失败，消息逐字透传
    #[error("协作服务错误: {0}")]
    Collab(String),
    #[error("状态错误: {0}")]
    State(String),
}

/// 当前选中的子树：当次解析内的快照，下次成功解析时被根选区替换
#[derive(Debug, Clone)]
pub struct Selection {
    pub display_path: String,
    pub json_path: String,
    pub value: Value,
}

impl Selection {
    fn whole_document(root: &Value) -> Self {
        Self {
            display_path: String::new(),
            json_path: "$".to_string(),
            value: root.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    /// 原始文本缓冲（唯一事实来源）
    text: String,
    /// 最近一次成功解析；缓冲非法时保留过期值供非树模式展示
    dom: Option<Value>,
    last_error: Option<ParseError>,
    mode: FormatMode,
    tree: TreeViewState,
    selection: Option<Selection>,
    /// 最近一次类型生成的结果文本
    generated_types: Option<String>,
    repair_pending: bool,
    codegen_pending: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// 创建会话并载入演示文档
    pub fn new() -> Self {
        let mut session = Self {
            text: String::new(),
            dom: None,
            last_error: None,
            mode: FormatMode::Raw,
            tree: TreeViewState::default(),
            selection: None,
            generated_types: None,
            repair_pending: false,
            codegen_pending: false,
        };
        session.set_text(DEMO_DOCUMENT.to_string());
        session
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> FormatMode {
        self.mode
    }

    pub fn last_error(&self) -> Option<&ParseError> {
        self.last_error.as_ref()
    }

    pub fn dom(&self) -> Option<&Value> {
        self.dom.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn generated_types(&self) -> Option<&str> {
        self.generated_types.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.last_error.is_none() && self.dom.is_some()
    }

    pub fn repair_pending(&self) -> bool {
        self.repair_pending
    }

    pub fn codegen_pending(&self) -> bool {
        self.codegen_pending
    }

    /// 每次文本变更都整体重解析；成功后选区回落到文档根
    pub fn set_text(&mut self, text: String) {
        self.text = text;
        self.reparse();
    }

    fn reparse(&mut self) {
        match format::parse_text(&self.text) {
            Ok(v) => {
                self.selection = Some(Selection::whole_document(&v));
                self.dom = Some(v);
                self.last_error = None;
            }
            Err(e) => {
                // 过期 DOM 保留，树模式渲染被 rows() 阻断；选区维持原样
                tracing::warn!("解析失败: {}", e);
                self.last_error = Some(e);
            }
        }
    }

    /// 格式化：成功后缓冲替换为 pretty 文本并进入 Pretty 模式。
    /// 返回是否经过了自动恢复（用于区分通知文案）
    pub fn format(&mut self) -> Result<bool, AppError> {
        let outcome = format::format_text(&self.text).map_err(AppError::RecoveryExhausted)?;
        self.mode = FormatMode::Pretty;
        let recovered = outcome.recovered;
        self.set_text(outcome.text);
        Ok(recovered)
    }

    /// 压缩：同样的恢复策略，成功后进入 Raw 模式
    pub fn minify(&mut self) -> Result<bool, AppError> {
        let outcome = format::minify_text(&self.text).map_err(AppError::RecoveryExhausted)?;
        self.mode = FormatMode::Raw;
        let recovered = outcome.recovered;
        self.set_text(outcome.text);
        Ok(recovered)
    }

    /// 对整个缓冲做纯文本转义
    pub fn escape(&mut self) {
        let escaped = format::escape_text(&self.text);
        self.set_text(escaped);
    }

    /// 对整个缓冲做纯文本反转义
    pub fn unescape(&mut self) {
        let unescaped = format::unescape_text(&self.text);
        self.set_text(unescaped);
    }

    /// 模式切换。进入 Pretty/Tree 且缓冲非法时先做一次恢复尝试；
    /// Raw 永不恢复（它只是现有文本的原样展示）；
    /// 合法缓冲切入 Tree 不改动文本，仅重新派生 Value
    pub fn set_mode(&mut self, mode: FormatMode) -> Result<(), AppError> {
        match mode {
            FormatMode::Raw => {
                self.mode = FormatMode::Raw;
                Ok(())
            }
            FormatMode::Pretty | FormatMode::Tree => {
                if !self.is_valid() {
                    let outcome =
                        format::format_text(&self.text).map_err(AppError::RecoveryExhausted)?;
                    self.set_text(outcome.text);
                } else if mode == FormatMode::Tree {
                    self.reparse();
                }
                self.mode = mode;
                Ok(())
            }
        }
    }

    /// 树视图行：缓冲非法时阻断渲染并透传解析错误
    pub fn rows(&self) -> Result<Vec<DisplayRow>, AppError> {
        if let Some(e) = &self.last_error {
            return Err(AppError::Parse(e.clone()));
        }
        let dom = self
            .dom
            .as_ref()
            .ok_or_else(|| AppError::State("文档尚未解析".into()))?;
        Ok(self.tree.produce_rows(dom))
    }

    /// 仅翻转该 JSONPath 的展开标记；后代各自的状态不受影响
    pub fn toggle_node(&mut self, json_path: &str) {
        self.tree.toggle(json_path);
    }

    /// 选择子树：记录选区快照，不触碰文档与展开状态
    pub fn select_node(&mut self, display_path: &str, json_path: &str) -> Result<(), AppError> {
        let value = self.resolve(json_path)?.clone();
        self.selection = Some(Selection {
            display_path: display_path.to_string(),
            json_path: json_path.to_string(),
            value,
        });
        Ok(())
    }

    fn resolve(&self, json_path: &str) -> Result<&Value, AppError> {
        let dom = self
            .dom
            .as_ref()
            .ok_or_else(|| AppError::State("文档尚未解析".into()))?;
        let hits: Vec<&Value> = dom
            .query(json_path)
            .map_err(|e| AppError::JsonPath(e.to_string()))?;
        hits.into_iter()
            .next()
            .ok_or_else(|| AppError::JsonPath("未匹配到任何节点".into()))
    }

    /// 按路径提取子树的 pretty 文本（复制用途；剪贴板放置由调用方完成）
    pub fn copy_subtree_pretty(&self, json_path: &str) -> Result<String, AppError> {
        let subtree = self.resolve(json_path)?;
        Ok(format::serialize_value(subtree, true))
    }

    /// 整个缓冲的复制负载
    pub fn copy_buffer(&self) -> &str {
        &self.text
    }

    /// 上传边界：逐字替换缓冲，不做校验；解析照常派生
    pub fn load_file(&mut self, p: &Path) -> Result<(), AppError> {
        let text = read_text_file(p)?;
        self.set_text(text);
        tracing::info!("已载入文件: {}", p.display());
        Ok(())
    }

    /// 导出当前缓冲为下载负载（data.json / application/json）
    pub fn export(&self) -> ExportPayload {
        ExportPayload::new(&self.text)
    }

    // === 协作服务门控：每种动作同一时刻至多一个在途请求 ===

    /// 发起修复请求；同类请求未完成时拒绝
    pub fn begin_repair(&mut self) -> Result<CollabRequest, AppError> {
        if self.repair_pending {
            return Err(AppError::State("修复请求尚未完成".into()));
        }
        self.repair_pending = true;
        Ok(CollabRequest::repair(self.text.clone()))
    }

    /// 修复完成：结果后到先得地作用于当前缓冲。
    /// 失败或结果不可解析时缓冲保持逐字不变
    pub fn finish_repair(&mut self, reply: CollabReply) -> Result<(), AppError> {
        self.repair_pending = false;
        let content = reply.map_err(|e| AppError::Collab(normalize_collab_error(e)))?;
        let cleaned = strip_code_fences(&content);
        let outcome = format::format_text(&cleaned)
            .map_err(|e| AppError::Collab(format!("修复结果不可解析: {}", e)))?;
        self.set_text(outcome.text);
        tracing::info!("修复结果已应用");
        Ok(())
    }

    /// 发起类型生成请求；要求缓冲当前解析合法
    pub fn begin_codegen(&mut self) -> Result<CollabRequest, AppError> {
        if self.codegen_pending {
            return Err(AppError::State("类型生成请求尚未完成".into()));
        }
        if !self.is_valid() {
            return Err(AppError::State("缓冲当前不是合法 JSON".into()));
        }
        self.codegen_pending = true;
        Ok(CollabRequest::codegen(self.text.clone()))
    }

    /// 类型生成完成：失败时保留上一次的生成结果
    pub fn finish_codegen(&mut self, reply: CollabReply) -> Result<(), AppError> {
        self.codegen_pending = false;
        let content = reply.map_err(|e| AppError::Collab(normalize_collab_error(e)))?;
        self.generated_types = Some(strip_code_fences(&content));
        Ok(())
    }
}

fn normalize_collab_error(message: String) -> String {
    if message.trim().is_empty() {
        DEFAULT_COLLAB_ERROR.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format::parse_text;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn session_with(text: &str) -> Session {
        let mut s = Session::new();
        s.set_text(text.to_string());
        s
    }

    #[test]
    fn test_new_session_loads_demo_document() {
        let session = Session::new();
        assert!(session.is_valid(), "演示文档应该解析成功");
        assert_eq!(session.mode(), FormatMode::Raw);

        let sel = session.selection().expect("启动后选区应为整篇文档");
        assert_eq!(sel.json_path, "$");
        assert_eq!(sel.display_path, "");
        assert_eq!(Some(&sel.value), session.dom());
    }

    #[test]
    fn test_invalid_edit_keeps_stale_dom_and_blocks_tree() {
        let mut session = session_with(r#"{"a":1}"#);
        let stale = session.dom().cloned();

        session.set_text("{broken".to_string());
        assert!(!session.is_valid());
        assert!(session.last_error().is_some(), "错误消息应逐字保留");
        assert_eq!(session.dom().cloned(), stale, "过期 DOM 应保留供非树模式展示");
        assert!(matches!(session.rows(), Err(AppError::Parse(_))), "树渲染应被阻断");
    }

    #[test]
    fn test_successful_reparse_resets_selection_to_root() {
        let mut session = session_with(r#"{"owner":{"id":1}}"#);
        session.select_node("owner", "$.owner").expect("选择子树应该成功");
        assert_eq!(session.selection().unwrap().display_path, "owner");

        // 刻意的简化：成功重解析后选区总是回到文档根
        session.set_text(r#"{"owner":{"id":2}}"#.to_string());
        let sel = session.selection().unwrap();
        assert_eq!(sel.display_path, "");
        assert_eq!(sel.json_path, "$");
    }

    #[test]
    fn test_selection_survives_failed_parse() {
        let mut session = session_with(r#"{"owner":{"id":1}}"#);
        session.select_node("owner", "$.owner").unwrap();

        session.set_text("{broken".to_string());
        assert_eq!(
            session.selection().unwrap().display_path,
            "owner",
            "解析失败不应清空既有选区"
        );
    }

    #[test]
    fn test_format_pretty_and_mode() {
        let mut session = session_with(r#"{"a":1,"b":2}"#);
        let recovered = session.format().expect("格式化应该成功");
        assert!(!recovered);
        assert_eq!(session.mode(), FormatMode::Pretty);
        assert_eq!(session.text(), "{\n  \"a\": 1,\n  \"b\": 2\n}");
    }

    #[test]
    fn test_minify_compact_and_mode() {
        let mut session = session_with("{\n  \"a\": 1\n}");
        session.set_mode(FormatMode::Pretty).unwrap();
        let recovered = session.minify().expect("压缩应该成功");
        assert!(!recovered);
        assert_eq!(session.mode(), FormatMode::Raw);
        assert_eq!(session.text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_format_recovery_notification() {
        let mut session = session_with("{\\\"a\\\":1}");
        let recovered = session.format().expect("恢复通道应该成功");
        assert!(recovered, "应发出自动恢复通知");
        assert_eq!(session.text(), "{\n  \"a\": 1\n}");
        assert!(session.is_valid());
    }

    #[test]
    fn test_format_failure_leaves_buffer_and_reports_first_error() {
        let mut session = session_with("{a:1");
        let before = session.text().to_string();
        let direct = parse_text("{a:1").unwrap_err();

        let err = session.format().expect_err("恢复也应该失败");
        assert_eq!(session.text(), before, "失败时缓冲保持不变");
        match err {
            AppError::RecoveryExhausted(pe) => {
                assert_eq!(pe.message, direct.message, "应报告首次解析的错误消息");
            }
            other => panic!("期望 RecoveryExhausted，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_set_mode_raw_never_recovers() {
        let mut session = session_with("{\\\"a\\\":1}");
        let before = session.text().to_string();
        session.set_mode(FormatMode::Raw).expect("Raw 切换永远成功");
        assert_eq!(session.text(), before, "Raw 是现有文本的原样展示");
        assert!(!session.is_valid(), "错误状态应保留");
    }

    #[test]
    fn test_set_mode_tree_recovers_invalid_buffer() {
        let mut session = session_with("{\\\"a\\\":1}");
        session.set_mode(FormatMode::Tree).expect("恢复后应可进入树模式");
        assert!(session.is_valid());
        assert_eq!(session.mode(), FormatMode::Tree);
        assert!(session.rows().is_ok());
    }

    #[test]
    fn test_set_mode_tree_on_valid_buffer_keeps_text() {
        let raw = "{ \"a\" : 1 }";
        let mut session = session_with(raw);
        session.set_mode(FormatMode::Tree).unwrap();
        assert_eq!(session.text(), raw, "合法缓冲切树模式不得改动文本");
    }

    #[test]
    fn test_set_mode_surfaces_failure_when_recovery_exhausted() {
        let mut session = session_with("{a:1");
        let err = session.set_mode(FormatMode::Tree).expect_err("不可恢复时应失败");
        assert!(matches!(err, AppError::RecoveryExhausted(_)));
        assert_eq!(session.mode(), FormatMode::Raw, "失败时模式保持原样");
    }

    #[test]
    fn test_select_node_does_not_mutate_document() {
        let mut session = session_with(r#"{"a":[{"b":1}]}"#);
        let before = session.text().to_string();
        let dom_before = session.dom().cloned();

        session.select_node("a[0]", "$.a[0]").expect("选择应该成功");
        let sel = session.selection().unwrap();
        assert_eq!(sel.value, parse_text(r#"{"b":1}"#).unwrap());
        assert_eq!(session.text(), before);
        assert_eq!(session.dom().cloned(), dom_before);
    }

    #[test]
    fn test_copy_subtree_round_trips() {
        let session = session_with(r#"{"a":[{"b":1}],"c":"x"}"#);
        for (json_path, expected) in [
            ("$", r#"{"a":[{"b":1}],"c":"x"}"#),
            ("$.a", r#"[{"b":1}]"#),
            ("$.a[0].b", "1"),
        ] {
            let copied = session.copy_subtree_pretty(json_path).expect("提取应该成功");
            assert_eq!(
                parse_text(&copied).unwrap(),
                parse_text(expected).unwrap(),
                "复制文本重新解析后应与原子树结构相等: {}",
                json_path
            );
        }
    }

    #[test]
    fn test_copy_missing_path_fails() {
        let session = session_with(r#"{"a":1}"#);
        assert!(matches!(
            session.copy_subtree_pretty("$.nope"),
            Err(AppError::JsonPath(_))
        ));
    }

    #[test]
    fn test_toggle_via_session_keeps_value_intact() {
        let mut session = session_with(r#"{"a":{"x":1},"b":2}"#);
        let dom_before = session.dom().cloned();

        session.toggle_node("$.a");
        let rows = session.rows().unwrap();
        assert!(rows.iter().all(|r| r.display_path != "a.x"), "折叠后不渲染后代");
        assert!(rows.iter().any(|r| r.display_path == "b"), "兄弟节点不受影响");
        assert_eq!(session.dom().cloned(), dom_before);
    }

    #[test]
    fn test_repair_gate_rejects_second_request() {
        let mut session = session_with("{broken");
        let req = session.begin_repair().expect("首个请求应被接受");
        assert_eq!(req.input, "{broken");

        let err = session.begin_repair().expect_err("在途期间应拒绝同类请求");
        assert!(matches!(err, AppError::State(_)));

        // 完成后门重新打开
        session.finish_repair(Ok(r#"{"ok":true}"#.to_string())).unwrap();
        assert!(session.begin_repair().is_ok());
    }

    #[test]
    fn test_repair_failure_leaves_buffer_byte_identical() {
        let mut session = session_with("{broken");
        let before = session.text().to_string();

        session.begin_repair().unwrap();
        let err = session
            .finish_repair(Err("上游超时".to_string()))
            .expect_err("失败回复应报错");
        assert_eq!(session.text(), before, "失败的修复不得触碰缓冲");
        match err {
            AppError::Collab(msg) => assert_eq!(msg, "上游超时", "消息应逐字透传"),
            other => panic!("期望 Collab 错误，实际为 {:?}", other),
        }
        assert!(!session.repair_pending(), "失败后门控应复位");
    }

    #[test]
    fn test_repair_empty_error_gets_default_message() {
        let mut session = session_with("{broken");
        session.begin_repair().unwrap();
        let err = session.finish_repair(Err(String::new())).unwrap_err();
        match err {
            AppError::Collab(msg) => assert_eq!(msg, crate::model::collab::DEFAULT_COLLAB_ERROR),
            other => panic!("期望 Collab 错误，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_repair_strips_fences_and_applies() {
        let mut session = session_with("{broken");
        session.begin_repair().unwrap();
        session
            .finish_repair(Ok("```json\n{\"fixed\": true}\n```".to_string()))
            .expect("修复应该成功");
        assert!(session.is_valid());
        assert_eq!(session.text(), "{\n  \"fixed\": true\n}");
    }

    #[test]
    fn test_repair_unparseable_reply_keeps_buffer() {
        let mut session = session_with("{broken");
        let before = session.text().to_string();
        session.begin_repair().unwrap();
        let err = session
            .finish_repair(Ok("still {not json".to_string()))
            .expect_err("不可解析的修复结果应报错");
        assert!(matches!(err, AppError::Collab(_)));
        assert_eq!(session.text(), before);
    }

    #[test]
    fn test_repair_applies_last_write_wins() {
        let mut session = session_with("{broken");
        session.begin_repair().unwrap();

        // 请求在途期间用户继续编辑；完成时结果仍然无条件作用于当前缓冲
        session.set_text("{still broken".to_string());
        session
            .finish_repair(Ok(r#"{"late":1}"#.to_string()))
            .expect("后到的结果照常应用");
        assert_eq!(session.text(), "{\n  \"late\": 1\n}");
    }

    #[test]
    fn test_codegen_requires_valid_buffer() {
        let mut session = session_with("{broken");
        let err = session.begin_codegen().expect_err("非法缓冲不应发起类型生成");
        assert!(matches!(err, AppError::State(_)));
        assert!(!session.codegen_pending());
    }

    #[test]
    fn test_codegen_gate_and_result() {
        let mut session = session_with(r#"{"id":1}"#);
        let req = session.begin_codegen().expect("合法缓冲应可发起");
        assert_eq!(req.input, r#"{"id":1}"#);
        assert!(session.begin_codegen().is_err(), "在途期间拒绝同类请求");

        session
            .finish_codegen(Ok("```ts\ninterface Root { readonly id: number }\n```".into()))
            .unwrap();
        assert_eq!(
            session.generated_types(),
            Some("interface Root { readonly id: number }")
        );
    }

    #[test]
    fn test_codegen_failure_keeps_previous_output() {
        let mut session = session_with(r#"{"id":1}"#);
        session.begin_codegen().unwrap();
        session.finish_codegen(Ok("interface Root {}".into())).unwrap();

        session.begin_codegen().unwrap();
        let err = session.finish_codegen(Err("配额用尽".into())).unwrap_err();
        assert!(matches!(err, AppError::Collab(_)));
        assert_eq!(
            session.generated_types(),
            Some("interface Root {}"),
            "失败不得覆盖上一次的生成结果"
        );
        let buffer = session.text().to_string();
        assert_eq!(buffer, r#"{"id":1}"#, "失败的类型生成不触碰缓冲");
    }

    #[test]
    fn test_load_file_replaces_buffer_verbatim() {
        let mut file = NamedTempFile::new().expect("创建临时文件失败");
        let raw = "{not json at all";
        file.write_all(raw.as_bytes()).expect("写入临时文件失败");

        let mut session = Session::new();
        session.load_file(file.path()).expect("上传本身不做校验");
        assert_eq!(session.text(), raw, "缓冲应被逐字替换");
        assert!(!session.is_valid(), "解析照常派生出错误状态");
    }

    #[test]
    fn test_export_payload() {
        let session = session_with(r#"{"a":1}"#);
        let payload = session.export();
        assert_eq!(payload.file_name, "data.json");
        assert_eq!(payload.mime, "application/json");
        assert_eq!(payload.bytes, session.text().as_bytes());
    }

    #[test]
    fn test_escape_then_unescape_restores_buffer() {
        let original = "{\"a\": \"x\"}";
        let mut session = session_with(original);
        session.escape();
        assert!(!session.is_valid(), "转义后的缓冲通常不再是合法 JSON");
        session.unescape();
        assert_eq!(session.text(), original);
        assert!(session.is_valid());
    }
}
