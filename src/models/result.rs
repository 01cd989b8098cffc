//! worker 输出的结构化结果
//!
//! 每种任务类型一个变体，字段缺失直接反序列化失败，不做宽松访问

use serde::{Deserialize, Serialize};

/// SingleDocument 的标题条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    /// 标题级别，如 `H1` / `H2`
    pub level: String,
    pub text: String,
    pub page: u32,
}

/// SingleDocument 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutline {
    pub title: String,
    pub outline: Vec<HeadingEntry>,
}

/// DocumentBatch 元数据
///
/// 字段都可缺省，但 `metadata` 键本身必须存在
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchMetadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_timestamp: Option<String>,
}

/// 排序后的章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: u32,
    pub page_number: u32,
}

/// 与 `extracted_sections` 按位置对齐的精炼文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsectionEntry {
    pub document: String,
    pub refined_text: String,
    pub page_number: u32,
}

/// DocumentBatch 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaAnalysis {
    pub metadata: BatchMetadata,
    pub extracted_sections: Vec<RankedSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsection_analysis: Vec<SubsectionEntry>,
}

/// 解码后的结果
///
/// 序列化时不带标签，保持 worker 原始结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DecodedResult {
    Outline(DocumentOutline),
    Analysis(PersonaAnalysis),
}

impl DecodedResult {
    /// DocumentBatch 响应里的 `extractedSections`
    pub fn extracted_section_count(&self) -> Option<usize> {
        match self {
            DecodedResult::Outline(_) => None,
            DecodedResult::Analysis(a) => Some(a.extracted_sections.len()),
        }
    }

    pub fn as_outline(&self) -> Option<&DocumentOutline> {
        match self {
            DecodedResult::Outline(o) => Some(o),
            DecodedResult::Analysis(_) => None,
        }
    }

    pub fn as_analysis(&self) -> Option<&PersonaAnalysis> {
        match self {
            DecodedResult::Analysis(a) => Some(a),
            DecodedResult::Outline(_) => None,
        }
    }
}
