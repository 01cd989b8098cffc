//! 上传输入

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 期望的文档类型
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// 调用方上传的单个文件
#[derive(Debug, Clone)]
pub struct UploadedItem {
    /// 原始文件名（仅用于生成落盘文件名和日志）
    pub file_name: String,
    /// 声明的内容类型
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedItem {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 便捷构造：PDF
    pub fn pdf(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(file_name, PDF_CONTENT_TYPE, bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// DocumentBatch 专用上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    pub persona: String,
    pub task: String,
}

impl BatchContext {
    pub fn new(persona: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            task: task.into(),
        }
    }
}

/// 已落盘的输入，顺序与上传顺序一致
#[derive(Debug, Clone, Default)]
pub struct StagedInputs {
    pub paths: Vec<PathBuf>,
}

impl StagedInputs {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
