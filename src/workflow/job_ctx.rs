//! 任务处理上下文
//!
//! 封装"我正在处理哪个任务、什么类型"这一信息，用作日志前缀

use std::fmt::Display;

use crate::models::{JobId, JobType};

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    pub job_id: JobId,
    pub job_type: JobType,
    /// 输入文件数量
    pub item_count: usize,
}

impl JobCtx {
    pub fn new(job_id: JobId, job_type: JobType, item_count: usize) -> Self {
        Self {
            job_id,
            job_type,
            item_count,
        }
    }

    /// 日志里使用的短 id
    pub fn short_id(&self) -> String {
        self.job_id.as_simple().chars().take(8).collect()
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[job {} {}]", self.short_id(), self.job_type)
    }
}
