//! 任务模型
//!
//! 一次请求对应一个 `Job`，状态只能向前推进：
//!
//! ```text
//! Received → Validated → Staged → Dispatched → {Completed, TimedOut, Failed}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::JobError;

/// 任务唯一标识，在受理时生成，用于工作区路径和日志关联
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 用于工作区目录名的短形式（不含连字符）
    pub fn as_simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务类型
///
/// 决定校验规则、worker 参数、时间预算和结果结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// 单文档结构提取
    SingleDocument,
    /// 多文档 + persona 分析
    DocumentBatch,
}

impl JobType {
    /// 允许的输入数量范围（闭区间）
    pub fn item_count_range(self) -> (usize, usize) {
        match self {
            JobType::SingleDocument => (1, 1),
            JobType::DocumentBatch => (3, 15),
        }
    }

    /// 建议时间预算，超出仅标记 `timeLimit: false`，不导致失败
    pub fn time_budget(self) -> Duration {
        match self {
            JobType::SingleDocument => Duration::from_secs(10),
            JobType::DocumentBatch => Duration::from_secs(60),
        }
    }

    pub fn requires_context(self) -> bool {
        matches!(self, JobType::DocumentBatch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SingleDocument => "single",
            JobType::DocumentBatch => "batch",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Received,
    Validated,
    Staged,
    Dispatched,
    Completed,
    TimedOut,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::TimedOut | JobState::Failed
        )
    }

    /// 合法转换表，其余一律拒绝
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Failed)
                | (Validated, Staged)
                | (Validated, Failed)
                | (Staged, Dispatched)
                | (Dispatched, Completed)
                | (Dispatched, TimedOut)
                | (Dispatched, Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 一个请求的工作单元
///
/// 只记录身份和状态；输入、结果、错误由流程层持有并在终态时组装到响应里
#[derive(Debug)]
pub struct Job {
    id: JobId,
    job_type: JobType,
    state: JobState,
}

impl Job {
    pub fn new(job_type: JobType) -> Self {
        Self::with_id(JobId::new(), job_type)
    }

    /// 使用调用方预先分配的 id
    pub fn with_id(id: JobId, job_type: JobType) -> Self {
        Self {
            id,
            job_type,
            state: JobState::Received,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// 推进状态
    ///
    /// 终态不可再进入任何状态；非法转换返回 `JobError::IllegalTransition`
    pub fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_moves_forward() {
        let mut job = Job::new(JobType::SingleDocument);
        for next in [
            JobState::Validated,
            JobState::Staged,
            JobState::Dispatched,
            JobState::Completed,
        ] {
            job.advance(next).unwrap();
        }
        assert_eq!(job.state(), JobState::Completed);
        assert!(job.state().is_terminal());
    }

    #[test]
    fn terminal_state_rejects_everything() {
        let mut job = Job::new(JobType::DocumentBatch);
        job.advance(JobState::Failed).unwrap();

        for next in [
            JobState::Received,
            JobState::Validated,
            JobState::Dispatched,
            JobState::Completed,
            JobState::Failed,
        ] {
            let err = job.advance(next).unwrap_err();
            assert!(matches!(err, JobError::IllegalTransition { .. }));
        }
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn cannot_skip_stages() {
        let mut job = Job::new(JobType::SingleDocument);
        assert!(job.advance(JobState::Dispatched).is_err());
        assert!(job.advance(JobState::Completed).is_err());
        job.advance(JobState::Validated).unwrap();
        assert!(job.advance(JobState::TimedOut).is_err());
        assert!(job.advance(JobState::Received).is_err());
    }

    #[test]
    fn ids_are_unique() {
        let a = Job::new(JobType::SingleDocument);
        let b = Job::new(JobType::SingleDocument);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().as_simple().len(), 32);
    }

    #[test]
    fn budgets_per_type() {
        assert_eq!(JobType::SingleDocument.time_budget(), Duration::from_secs(10));
        assert_eq!(JobType::DocumentBatch.time_budget(), Duration::from_secs(60));
        assert_eq!(JobType::DocumentBatch.item_count_range(), (3, 15));
    }
}
