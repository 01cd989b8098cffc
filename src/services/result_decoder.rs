//! 结果解码服务 - 业务能力层
//!
//! 把 worker 的 stdout 解析为对应任务类型的结构，任何失败都转为 `JobError::Decode`

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{JobError, JobResult};
use crate::models::{DecodedResult, DocumentOutline, JobType, PersonaAnalysis};
use crate::utils::logging::truncate_text;

/// 错误里保留的原始输出长度
const RAW_PREVIEW_CHARS: usize = 2000;

pub struct ResultDecoder;

impl ResultDecoder {
    pub fn new() -> Self {
        Self
    }

    /// 解析 worker 输出
    ///
    /// stdout 必须恰好是一个 JSON 文档（首尾空白除外）
    pub fn decode(&self, job_type: JobType, raw: &str) -> JobResult<DecodedResult> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(JobError::decode("worker 没有输出任何内容", raw));
        }

        let decoded = match job_type {
            JobType::SingleDocument => DecodedResult::Outline(parse::<DocumentOutline>(trimmed)?),
            JobType::DocumentBatch => {
                let analysis = parse::<PersonaAnalysis>(trimmed)?;
                check_alignment(&analysis, trimmed)?;
                DecodedResult::Analysis(analysis)
            }
        };

        debug!("解析成功: {:?}", job_type);
        Ok(decoded)
    }

    /// 结构是否符合该任务类型
    pub fn matches_schema(&self, job_type: JobType, result: &DecodedResult) -> bool {
        match (job_type, result) {
            (JobType::SingleDocument, DecodedResult::Outline(_)) => true,
            (JobType::DocumentBatch, DecodedResult::Analysis(a)) => {
                a.subsection_analysis.is_empty()
                    || a.subsection_analysis.len() == a.extracted_sections.len()
            }
            _ => false,
        }
    }
}

impl Default for ResultDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: DeserializeOwned>(raw: &str) -> JobResult<T> {
    serde_json::from_str(raw).map_err(|e| {
        JobError::decode(
            format!("worker 输出不符合预期结构: {}", e),
            truncate_text(raw, RAW_PREVIEW_CHARS),
        )
    })
}

/// `subsection_analysis` 存在时必须与 `extracted_sections` 按位置一一对应
fn check_alignment(analysis: &PersonaAnalysis, raw: &str) -> JobResult<()> {
    let sections = analysis.extracted_sections.len();
    let subsections = analysis.subsection_analysis.len();
    if subsections != 0 && subsections != sections {
        return Err(JobError::decode(
            format!(
                "subsection_analysis 数量 {} 与 extracted_sections 数量 {} 不一致",
                subsections, sections
            ),
            truncate_text(raw, RAW_PREVIEW_CHARS),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTLINE: &str = r#"{"title":"T","outline":[{"level":"H1","text":"Intro","page":1}]}"#;

    const ANALYSIS: &str = r#"{
        "metadata": {"input_documents": ["a.pdf"], "persona": "Travel Planner", "job_to_be_done": "Plan a trip"},
        "extracted_sections": [
            {"document": "a.pdf", "section_title": "Beaches", "importance_rank": 1, "page_number": 3}
        ],
        "subsection_analysis": [
            {"document": "a.pdf", "refined_text": "Sand.", "page_number": 3}
        ]
    }"#;

    #[test]
    fn decodes_outline() {
        let decoded = ResultDecoder::new()
            .decode(JobType::SingleDocument, &format!("{}\n", OUTLINE))
            .unwrap();
        let outline = decoded.as_outline().unwrap();
        assert_eq!(outline.title, "T");
        assert_eq!(outline.outline.len(), 1);
        assert_eq!(outline.outline[0].level, "H1");
    }

    #[test]
    fn decodes_analysis() {
        let decoder = ResultDecoder::new();
        let decoded = decoder.decode(JobType::DocumentBatch, ANALYSIS).unwrap();
        assert_eq!(decoded.extracted_section_count(), Some(1));
        assert!(decoder.matches_schema(JobType::DocumentBatch, &decoded));
        assert!(!decoder.matches_schema(JobType::SingleDocument, &decoded));
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let err = ResultDecoder::new()
            .decode(JobType::SingleDocument, "{\"title\": ")
            .unwrap_err();
        match err {
            JobError::Decode { raw, .. } => assert_eq!(raw, "{\"title\": "),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_is_decode_error() {
        let decoder = ResultDecoder::new();
        assert!(decoder
            .decode(JobType::SingleDocument, r#"{"title":"T"}"#)
            .is_err());
        assert!(decoder
            .decode(JobType::DocumentBatch, r#"{"extracted_sections":[]}"#)
            .is_err());
        assert!(decoder.decode(JobType::DocumentBatch, OUTLINE).is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let raw = format!("{}\nprogress: done", OUTLINE);
        assert!(ResultDecoder::new()
            .decode(JobType::SingleDocument, &raw)
            .is_err());
    }

    #[test]
    fn misaligned_subsections_rejected() {
        let raw = r#"{
            "metadata": {},
            "extracted_sections": [],
            "subsection_analysis": [{"document": "a.pdf", "refined_text": "x", "page_number": 1}]
        }"#;
        assert!(ResultDecoder::new().decode(JobType::DocumentBatch, raw).is_err());
    }

    #[test]
    fn empty_output_rejected() {
        assert!(ResultDecoder::new()
            .decode(JobType::SingleDocument, "  \n")
            .is_err());
    }
}
