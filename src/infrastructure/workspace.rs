//! 工作区管理 - 基础设施层
//!
//! 每个任务独占一个目录 `<temp_root>/job_<id>`，终态后删除且只删除一次

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ReleaseError;
use crate::models::JobId;

/// 单个任务的工作区
///
/// 正常路径由 `WorkspaceManager::release` 删除；若任务 future 被取消或 panic，
/// `Drop` 会同步兜底删除
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    path: PathBuf,
    released: AtomicBool,
}

impl Workspace {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 标记为已释放，返回是否是第一次
    fn claim_release(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.claim_release() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("[job {}] 工作区已在 drop 时删除", self.job_id),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!(
                "[job {}] ⚠️ drop 时删除工作区失败 {}: {}",
                self.job_id,
                self.path.display(),
                e
            ),
        }
    }
}

/// 工作区管理器
///
/// 根目录在构造时注入，不读取任何全局状态
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    cleanup_timeout: Duration,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, cleanup_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            cleanup_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 为任务创建独占目录
    ///
    /// 目录已存在视为冲突，直接报错而不是复用
    pub async fn allocate(&self, job_id: JobId) -> std::io::Result<Workspace> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(format!("job_{}", job_id.as_simple()));
        tokio::fs::create_dir(&path).await?;
        debug!("[job {}] 工作区已创建: {}", job_id, path.display());

        Ok(Workspace {
            job_id,
            path,
            released: AtomicBool::new(false),
        })
    }

    /// 删除工作区及其所有内容
    ///
    /// 幂等：重复调用、目录不存在都返回 `Ok`。只有意外的 I/O 错误或超时才返回错误，
    /// 调用方记录日志即可
    pub async fn release(&self, workspace: &Workspace) -> Result<(), ReleaseError> {
        if !workspace.claim_release() {
            return Ok(());
        }

        let path = workspace.path.clone();
        match tokio::time::timeout(self.cleanup_timeout, tokio::fs::remove_dir_all(&path)).await {
            Ok(Ok(())) => {
                debug!("[job {}] 🗑️ 工作区已删除", workspace.job_id);
                Ok(())
            }
            Ok(Err(e)) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Ok(Err(source)) => Err(ReleaseError::Io { path, source }),
            Err(_) => Err(ReleaseError::TimedOut {
                path,
                timeout: self.cleanup_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(root: &TempDir) -> WorkspaceManager {
        WorkspaceManager::new(root.path().join("jobs"), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn allocate_creates_unique_dirs() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);

        let a = manager.allocate(JobId::new()).await.unwrap();
        let b = manager.allocate(JobId::new()).await.unwrap();

        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(manager.root()));
    }

    #[tokio::test]
    async fn allocate_refuses_existing_dir() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let id = JobId::new();

        let _first = manager.allocate(id).await.unwrap();
        let second = manager.allocate(id).await;
        assert_eq!(second.unwrap_err().kind(), IoErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let ws = manager.allocate(JobId::new()).await.unwrap();
        tokio::fs::write(ws.path().join("doc_0_a.pdf"), b"%PDF").await.unwrap();

        manager.release(&ws).await.unwrap();
        assert!(!ws.path().exists());
        assert!(ws.is_released());

        manager.release(&ws).await.unwrap();
    }

    #[tokio::test]
    async fn release_tolerates_missing_dir() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let ws = manager.allocate(JobId::new()).await.unwrap();

        std::fs::remove_dir_all(ws.path()).unwrap();
        manager.release(&ws).await.unwrap();
    }

    #[tokio::test]
    async fn drop_removes_unreleased_workspace() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let ws = manager.allocate(JobId::new()).await.unwrap();
        let path = ws.path().to_path_buf();

        drop(ws);
        assert!(!path.exists());
    }
}
