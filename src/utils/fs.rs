//! IO helper: verbatim text read/write for upload & export

use std::{fs, path::Path};

use crate::model::session::AppError;

pub const EXPORT_FILE_NAME: &str = "data.json";
pub const EXPORT_MIME: &str = "application/json";

/// 上传边界：逐字读入文本，不做任何 JSON 校验
pub fn read_text_file(p: &Path) -> Result<String, AppError> {
    Ok(fs::read_to_string(p)?)
}

/// 下载负载：当前缓冲的逐字字节流，文件名与 MIME 固定
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportPayload {
    pub fn new(buffer: &str) -> Self {
        Self {
            file_name: EXPORT_FILE_NAME,
            mime: EXPORT_MIME,
            bytes: buffer.as_bytes().to_vec(),
        }
    }
}

/// 将导出负载落盘（命令行与测试用）
pub fn write_export(p: &Path, payload: &ExportPayload) -> Result<(), AppError> {
    Ok(fs::write(p, &payload.bytes)?)
}
