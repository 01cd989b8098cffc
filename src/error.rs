use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::job::{JobState, JobType};

/// 任务错误
///
/// 每个终态失败都归到其中一类，不会有未分类的错误逃出编排层
#[derive(Debug, Error)]
pub enum JobError {
    /// 输入形状 / 大小 / 数量不合法
    #[error("输入校验失败: {0}")]
    Validation(#[from] ValidationError),

    /// 写入工作区失败（已回滚）
    #[error("暂存输入失败 ({}): {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// worker 无法启动，或前置资源缺失
    #[error("worker 启动失败: {message}")]
    Launch { message: String },

    /// worker 运行了但报告失败
    #[error("worker 执行失败 (exit code: {}): {stderr}", fmt_exit_code(.exit_code))]
    Worker {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// 超过硬截止时间被强制终止
    #[error("处理超时: {}s 内未完成，worker 已被终止", .after.as_secs_f64())]
    TimedOut { after: Duration },

    /// worker 成功退出但输出无法解析或不符合结构
    #[error("结果解析失败: {reason}")]
    Decode { reason: String, raw: String },

    /// 状态机拒绝的转换
    #[error("非法状态转换: {from} -> {to}")]
    IllegalTransition { from: JobState, to: JobState },
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

/// 输入校验错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("第 {index} 个文件 {file_name} 类型为 {content_type}，仅支持 PDF")]
    InvalidContentType {
        index: usize,
        file_name: String,
        content_type: String,
    },

    #[error("第 {index} 个文件 {file_name} 大小 {size} 字节超过上限 {limit} 字节")]
    PayloadTooLarge {
        index: usize,
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("{job_type} 任务需要 {min}-{max} 个文件，实际 {count} 个")]
    InvalidItemCount {
        job_type: JobType,
        count: usize,
        min: usize,
        max: usize,
    },

    #[error("缺少 {field}")]
    MissingContext { field: &'static str },
}

/// 响应中的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    StagingError,
    LaunchError,
    WorkerError,
    TimedOut,
    DecodeError,
    /// 编排层自身异常（非法状态转换、任务 panic）
    Internal,
}

impl ErrorKind {
    /// 对应的 4xx / 5xx 语义
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 400,
            ErrorKind::StagingError
            | ErrorKind::LaunchError
            | ErrorKind::WorkerError
            | ErrorKind::Internal => 500,
            ErrorKind::DecodeError => 502,
            ErrorKind::TimedOut => 504,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Validation(_) => ErrorKind::ValidationError,
            JobError::Staging { .. } => ErrorKind::StagingError,
            JobError::Launch { .. } => ErrorKind::LaunchError,
            JobError::Worker { .. } => ErrorKind::WorkerError,
            JobError::TimedOut { .. } => ErrorKind::TimedOut,
            JobError::Decode { .. } => ErrorKind::DecodeError,
            JobError::IllegalTransition { .. } => ErrorKind::Internal,
        }
    }

    /// 失败时应进入的终态
    pub fn terminal_state(&self) -> JobState {
        match self {
            JobError::TimedOut { .. } => JobState::TimedOut,
            _ => JobState::Failed,
        }
    }

    /// 返回给调用方的错误文本
    pub fn user_message(&self) -> String {
        match self {
            JobError::Validation(e) => e.to_string(),
            other => format!("Processing failed: {}", other),
        }
    }
}

/// 工作区释放错误
///
/// 只记录日志，不改变已确定的任务结果
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("删除工作区失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("删除工作区超时 ({}): 超过 {}s", .path.display(), .timeout.as_secs())]
    TimedOut { path: PathBuf, timeout: Duration },
}

// ========== 便捷构造函数 ==========

impl JobError {
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Staging {
            path: path.into(),
            source,
        }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        JobError::Launch {
            message: message.into(),
        }
    }

    pub fn decode(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        JobError::Decode {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

// ========== Result 类型别名 ==========

pub type JobResult<T> = Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_and_terminal_state() {
        let timed_out = JobError::TimedOut {
            after: Duration::from_secs(3),
        };
        assert_eq!(timed_out.kind(), ErrorKind::TimedOut);
        assert_eq!(timed_out.terminal_state(), JobState::TimedOut);

        let worker = JobError::Worker {
            exit_code: Some(1),
            stderr: "model load failed".into(),
        };
        assert_eq!(worker.kind(), ErrorKind::WorkerError);
        assert_eq!(worker.terminal_state(), JobState::Failed);
        assert!(worker.user_message().contains("model load failed"));
        assert!(worker.user_message().starts_with("Processing failed:"));
    }

    #[test]
    fn validation_maps_to_client_error() {
        let err: JobError = ValidationError::MissingContext { field: "persona" }.into();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.kind().status_code(), 400);
        assert!(!err.user_message().starts_with("Processing failed"));
    }

    #[test]
    fn illegal_transition_is_internal() {
        let err = JobError::IllegalTransition {
            from: JobState::Completed,
            to: JobState::Dispatched,
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().status_code(), 500);
        assert_eq!(err.terminal_state(), JobState::Failed);
    }

    #[test]
    fn signal_exit_is_rendered() {
        let err = JobError::Worker {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }
}
