//! 程序入口：初始化日志，载入文档（或演示文档），按需格式化/压缩，
//! 默认输出结构树预览

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::fmt::SubscriberBuilder;

use json_shitu::model::session::Session;
use json_shitu::model::tree_view::{DisplayRow, NodeKind};
use json_shitu::utils::clipboard;
use json_shitu::vm::bridge::{
    STATUS_COPIED, STATUS_ERROR_PREFIX, STATUS_FORMATTED, STATUS_MINIFIED, STATUS_READY,
    STATUS_RECOVERED,
};
use json_shitu::FormatMode;

/// 一行结构树的文本形式：缩进 + 标签 + 预览/摘要
fn render_row(row: &DisplayRow) -> String {
    let indent = "  ".repeat(row.depth as usize);
    let label = match &row.label {
        Some(l) => format!("{}: ", l),
        None => String::new(),
    };
    let marker = match row.kind {
        NodeKind::Object | NodeKind::Array if row.expandable && !row.expanded => "▸ ",
        NodeKind::Object | NodeKind::Array if row.expandable => "▾ ",
        _ => "",
    };
    format!("{}{}{}{}", indent, marker, label, row.preview)
}

fn main() -> ExitCode {
    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let copy_requested = args.iter().any(|a| a == "--copy");
    let format_requested = args.iter().any(|a| a == "--format");
    let minify_requested = args.iter().any(|a| a == "--minify");

    let mut session = Session::new();
    if let Some(path) = args.iter().find(|a| !a.starts_with("--")).map(PathBuf::from) {
        if let Err(e) = session.load_file(&path) {
            eprintln!("{}{}", STATUS_ERROR_PREFIX, e);
            return ExitCode::FAILURE;
        }
    }

    // 格式化/压缩模式：输出转换后的缓冲而非结构树
    if format_requested || minify_requested {
        let outcome = if minify_requested {
            session.minify()
        } else {
            session.format()
        };
        return match outcome {
            Ok(recovered) => {
                println!("{}", session.text());
                let status = if recovered {
                    STATUS_RECOVERED
                } else if minify_requested {
                    STATUS_MINIFIED
                } else {
                    STATUS_FORMATTED
                };
                tracing::info!("{}", status);
                if copy_requested {
                    clipboard::place_text(session.copy_buffer());
                    tracing::info!("{}", STATUS_COPIED);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}{}", STATUS_ERROR_PREFIX, e);
                ExitCode::FAILURE
            }
        };
    }

    if copy_requested {
        // 即发即忘的剪贴板放置
        clipboard::place_text(session.copy_buffer());
        tracing::info!("{}", STATUS_COPIED);
    }

    if let Err(e) = session.set_mode(FormatMode::Tree) {
        eprintln!("{}{}", STATUS_ERROR_PREFIX, e);
        return ExitCode::FAILURE;
    }

    match session.rows() {
        Ok(rows) => {
            for row in &rows {
                println!("{}", render_row(row));
            }
            tracing::info!("{}", STATUS_READY);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}{}", STATUS_ERROR_PREFIX, e);
            ExitCode::FAILURE
        }
    }
}
