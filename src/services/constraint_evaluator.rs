//! 约束评估服务 - 业务能力层
//!
//! 只给出提示性标记：超出时间预算的结果仍然算成功

use std::time::Duration;

use crate::models::{ConstraintReport, DecodedResult, JobType};
use crate::services::ResultDecoder;

pub struct ConstraintEvaluator {
    decoder: ResultDecoder,
    single_budget: Duration,
    batch_budget: Duration,
}

impl ConstraintEvaluator {
    /// 默认预算：SingleDocument 10s，DocumentBatch 60s
    pub fn new() -> Self {
        Self::with_budgets(
            JobType::SingleDocument.time_budget(),
            JobType::DocumentBatch.time_budget(),
        )
    }

    pub fn with_budgets(single_budget: Duration, batch_budget: Duration) -> Self {
        Self {
            decoder: ResultDecoder::new(),
            single_budget,
            batch_budget,
        }
    }

    fn budget_for(&self, job_type: JobType) -> Duration {
        match job_type {
            JobType::SingleDocument => self.single_budget,
            JobType::DocumentBatch => self.batch_budget,
        }
    }

    pub fn evaluate(
        &self,
        job_type: JobType,
        elapsed: Duration,
        result: &DecodedResult,
    ) -> ConstraintReport {
        ConstraintReport {
            time_limit: elapsed <= self.budget_for(job_type),
            format_valid: self.decoder.matches_schema(job_type, result),
        }
    }
}

impl Default for ConstraintEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
