//! 树视图状态：逐节点展开/折叠与可见行产出
//!
//! 展开状态以"JSONPath → bool"的键控映射存放，与任何一次渲染调用
//! 解耦；行序列在每次 Value 变化后全量重算，从不做增量 diff。
//! 键用 JSONPath 而非显示路径：显示路径在键名含 `.` 时会与嵌套
//! 位置同形，JSONPath 的 bracket-notation 保证不同位置键不同

use std::collections::HashMap;

use serde_json::Value;

use crate::model::paths::{display_path, jsonpath, looks_numeric, PathSeg};

/// JSON 节点类型（与 UI 展示解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

/// 对五类变体做穷尽匹配，消费端不再出现动态类型判断
pub fn kind_of(v: &Value) -> NodeKind {
    match v {
        Value::Object(_) => NodeKind::Object,
        Value::Array(_) => NodeKind::Array,
        Value::String(_) => NodeKind::String,
        Value::Number(_) => NodeKind::Number,
        Value::Bool(_) => NodeKind::Bool,
        Value::Null => NodeKind::Null,
    }
}

/// 结构树的一行
#[derive(Debug, Clone)]
pub struct DisplayRow {
    /// 父级中的键名或下标标签；根节点为 None
    pub label: Option<String>,
    /// 显示路径（根为空串；仅用于展示）
    pub display_path: String,
    /// RFC 9535 JSONPath（展开状态的键，也用于按路径提取子树）
    pub json_path: String,
    /// 节点类型
    pub kind: NodeKind,
    /// 子元素数量（对象字段数 / 数组长度）；折叠行用它做摘要
    pub children: u32,
    /// 轻量预览（字符串截断、数字/布尔/空的简短描述）
    pub preview: String,
    /// 节点深度（用于缩进显示）
    pub depth: u32,
    /// 当前是否展开
    pub expanded: bool,
    /// 是否可展开；空的 {} / [] 恒为 false
    pub expandable: bool,
    /// 数字样式的键名（仅显示强调；键永远不被当作数字）
    pub numeric_key: bool,
}

/// 展开/折叠状态存储，按 JSONPath 键控。缺省展开；折叠父节点
/// 只隐藏后代的渲染，不改写后代各自存储的状态
#[derive(Debug, Default)]
pub struct TreeViewState {
    expanded: HashMap<String, bool>,
}

impl TreeViewState {
    pub fn is_expanded(&self, json_path: &str) -> bool {
        self.expanded.get(json_path).copied().unwrap_or(true)
    }

    /// 仅翻转该 JSONPath 自身的展开标记
    pub fn toggle(&mut self, json_path: &str) {
        let next = !self.is_expanded(json_path);
        self.expanded.insert(json_path.to_string(), next);
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }

    /// 从根 Value 全量产出可见行：对象按插入序，数组按下标递增。
    /// 有限、可重启，每次调用都重新计算
    pub fn produce_rows(&self, root: &Value) -> Vec<DisplayRow> {
        let mut out = Vec::with_capacity(64);
        let mut segs: Vec<PathSeg> = Vec::new();
        self.walk(root, &mut segs, 0, &mut out);
        out
    }

    fn walk(&self, v: &Value, segs: &mut Vec<PathSeg>, depth: u32, out: &mut Vec<DisplayRow>) {
        let dpath = display_path(segs);
        let jpath = jsonpath(segs);
        let children = child_count(v);
        let expandable = matches!(v, Value::Object(_) | Value::Array(_)) && children > 0;
        let expanded = expandable && self.is_expanded(&jpath);
        let (label, numeric_key) = match segs.last() {
            None => (None, false),
            Some(PathSeg::Key(k)) => (Some(k.clone()), looks_numeric(k)),
            Some(PathSeg::Index(i)) => (Some(format!("[{}]", i)), false),
        };

        out.push(DisplayRow {
            label,
            display_path: dpath,
            json_path: jpath,
            kind: kind_of(v),
            children,
            preview: preview_of(v),
            depth,
            expanded,
            expandable,
            numeric_key,
        });

        // 折叠的复合节点只留摘要行，不再下钻
        if !expanded {
            return;
        }
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    segs.push(PathSeg::Key(k.clone()));
                    self.walk(child, segs, depth + 1, out);
                    segs.pop();
                }
            }
            Value::Array(arr) => {
                for (idx, child) in arr.iter().enumerate() {
                    segs.push(PathSeg::Index(idx));
                    self.walk(child, segs, depth + 1, out);
                    segs.pop();
                }
            }
            _ => {}
        }
    }
}

fn child_count(v: &Value) -> u32 {
    match v {
        Value::Object(m) => m.len() as u32,
        Value::Array(a) => a.len() as u32,
        _ => 0,
    }
}

fn preview_of(v: &Value) -> String {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.chars().count() > 32 {
                let truncated: String = s.chars().take(32).collect();
                format!("\"{}...\"", truncated)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Object(m) => format!("{{..}} ({} keys)", m.len()),
        Value::Array(a) => format!("[..] ({} items)", a.len()),
    }
}
