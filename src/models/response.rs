//! 返回给调用方的响应
//!
//! 与传输层无关，展示层原样渲染

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::job::{JobId, JobState};
use crate::models::result::DecodedResult;

/// 约束检查结果（仅作提示，不影响成功与否）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintReport {
    pub time_limit: bool,
    pub format_valid: bool,
}

/// 任务响应
///
/// 终态要么带 `result`，要么带 `error`，不会两者皆无或皆有
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub success: bool,
    pub job_id: JobId,
    /// 终态
    pub state: JobState,
    /// 从受理到终态的耗时（秒）
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DecodedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints_met: Option<ConstraintReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_sections: Option<usize>,
}

impl JobResponse {
    /// 传输层可用的状态码（成功 200）
    pub fn status_code(&self) -> u16 {
        self.error_kind.map(|k| k.status_code()).unwrap_or(200)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
