//! 路径寻址：值树中的位置 ↔ 可读路径字符串
//!
//! 同一位置同时产出两种形式：
//! - 显示路径：对象成员 `.key`（深度 0 为裸 key），数组元素 `[i]`，根为空串
//! - RFC 9535 JSONPath：`$` 起始，供按路径提取子树时精确寻址
//!
//! 对固定的树形状，两种映射都是全函数且单射：不同的可达位置
//! 永远得到不同的字符串。仅用于展示与"复制此子树"寻址，不做持久引用

/// 一段访问器：对象键或数组下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

/// 显示路径。`[` 前不插分隔符，数组套对象/数组直接连写
pub fn display_path(segs: &[PathSeg]) -> String {
    let mut out = String::new();
    for seg in segs {
        match seg {
            PathSeg::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathSeg::Index(i) => {
                out.push_str(&format!("[{}]", i));
            }
        }
    }
    out
}

/// RFC 9535 JSONPath。键含特殊字符时使用 bracket-notation
pub fn jsonpath(segs: &[PathSeg]) -> String {
    let mut out = String::from("$");
    for seg in segs {
        match seg {
            PathSeg::Key(k) => {
                if is_plain_member_name(k) {
                    out.push('.');
                    out.push_str(k);
                } else {
                    out.push_str(&format!("['{}']", k.replace('\'', "\\'")));
                }
            }
            PathSeg::Index(i) => {
                out.push_str(&format!("[{}]", i));
            }
        }
    }
    out
}

// 点记法要求首字符为字母或下划线；纯数字键等一律走 bracket-notation
fn is_plain_member_name(k: &str) -> bool {
    let mut chars = k.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 数字样式的键：仅用于显示强调，对象键永远不会被转换成数字
pub fn looks_numeric(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}
