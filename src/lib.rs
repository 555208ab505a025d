//! JSON编辑/可视化核心库
//!
//! 以原始文本缓冲为唯一事实来源，提供格式转换（含转义恢复策略）、
//! 路径寻址、树视图状态与协作服务门控
//! 遵循MVVM架构模式，UI层与AI网络调用在核心之外

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::format::{FormatMode, ParseError};
pub use model::session::{AppError, Selection, Session};
pub use model::tree_view::{DisplayRow, NodeKind, TreeViewState};
