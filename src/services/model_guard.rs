//! 模型资源检查 - 业务能力层
//!
//! DocumentBatch 派发前确认预置模型存在

use std::path::{Path, PathBuf};

use crate::error::{JobError, JobResult};

pub struct ModelGuard {
    model_dir: PathBuf,
    model_name: String,
}

impl ModelGuard {
    pub fn new(model_dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_name: model_name.into(),
        }
    }

    /// 传给 worker 的模型目录
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub async fn ensure_available(&self) -> JobResult<()> {
        let model_path = self.model_dir.join(&self.model_name);
        match tokio::fs::try_exists(&model_path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(JobError::launch(format!(
                "模型资源不存在: {}",
                model_path.display()
            ))),
            Err(e) => Err(JobError::launch(format!(
                "无法检查模型资源 {}: {}",
                model_path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn detects_presence() {
        let dir = TempDir::new().unwrap();
        let guard = ModelGuard::new(dir.path(), "all-MiniLM-L6-v2");
        assert!(matches!(
            guard.ensure_available().await,
            Err(JobError::Launch { .. })
        ));

        std::fs::create_dir(dir.path().join("all-MiniLM-L6-v2")).unwrap();
        assert!(guard.ensure_available().await.is_ok());
    }
}
