//! 输入暂存服务 - 业务能力层
//!
//! 先校验全部输入，校验通过后才写入工作区

use tracing::{debug, warn};

use crate::error::{JobError, JobResult, ValidationError};
use crate::infrastructure::{Workspace, WorkspaceManager};
use crate::models::{BatchContext, JobType, StagedInputs, UploadedItem, PDF_CONTENT_TYPE};

const MAX_NAME_CHARS: usize = 96;

/// 输入暂存服务
///
/// 职责：
/// - 校验类型、大小、数量、上下文
/// - 以 `doc_<序号>_<文件名>` 写入工作区
/// - 写入中途失败时通过 `WorkspaceManager` 回滚
pub struct InputStager {
    max_item_bytes: u64,
}

impl InputStager {
    pub fn new(max_item_bytes: u64) -> Self {
        Self { max_item_bytes }
    }

    /// 校验输入，不触碰文件系统
    pub fn validate(
        &self,
        job_type: JobType,
        items: &[UploadedItem],
        context: Option<&BatchContext>,
    ) -> Result<(), ValidationError> {
        let (min, max) = job_type.item_count_range();
        if items.len() < min || items.len() > max {
            return Err(ValidationError::InvalidItemCount {
                job_type,
                count: items.len(),
                min,
                max,
            });
        }

        for (index, item) in items.iter().enumerate() {
            if !is_pdf(&item.content_type) {
                return Err(ValidationError::InvalidContentType {
                    index,
                    file_name: item.file_name.clone(),
                    content_type: item.content_type.clone(),
                });
            }
            if item.size() > self.max_item_bytes {
                return Err(ValidationError::PayloadTooLarge {
                    index,
                    file_name: item.file_name.clone(),
                    size: item.size(),
                    limit: self.max_item_bytes,
                });
            }
        }

        if job_type.requires_context() {
            let context = context.cloned().unwrap_or_default();
            if context.persona.trim().is_empty() {
                return Err(ValidationError::MissingContext { field: "persona" });
            }
            if context.task.trim().is_empty() {
                return Err(ValidationError::MissingContext { field: "task" });
            }
        }

        Ok(())
    }

    /// 写入所有输入
    ///
    /// 任意一个失败就释放整个工作区，不留下部分写入
    pub async fn stage(
        &self,
        workspaces: &WorkspaceManager,
        workspace: &Workspace,
        items: &[UploadedItem],
    ) -> JobResult<StagedInputs> {
        let mut staged = StagedInputs::default();

        for (index, item) in items.iter().enumerate() {
            let path = workspace
                .path()
                .join(format!("doc_{}_{}", index, sanitize_file_name(&item.file_name)));

            if let Err(e) = tokio::fs::write(&path, &item.bytes).await {
                warn!(
                    "[job {}] ⚠️ 写入第 {} 个文件失败，回滚工作区: {}",
                    workspace.job_id(),
                    index,
                    e
                );
                if let Err(release_err) = workspaces.release(workspace).await {
                    warn!("[job {}] 回滚失败: {}", workspace.job_id(), release_err);
                }
                return Err(JobError::staging(path, e));
            }

            debug!(
                "[job {}] 已暂存 {} ({} 字节)",
                workspace.job_id(),
                path.display(),
                item.size()
            );
            staged.paths.push(path);
        }

        Ok(staged)
    }
}

/// 忽略大小写和参数部分（如 `; charset=binary`）
fn is_pdf(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|t| t.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// 只保留最后一段路径，并替换掉不安全字符
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobId;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pdfs(n: usize) -> Vec<UploadedItem> {
        (0..n)
            .map(|i| UploadedItem::pdf(format!("file{}.pdf", i), b"%PDF-1.4".to_vec()))
            .collect()
    }

    fn ctx() -> BatchContext {
        BatchContext::new("Travel Planner", "Plan a trip")
    }

    #[test]
    fn batch_count_boundaries() {
        let stager = InputStager::new(1024);
        let ctx = ctx();

        for (n, ok) in [(2, false), (3, true), (15, true), (16, false)] {
            let result = stager.validate(JobType::DocumentBatch, &pdfs(n), Some(&ctx));
            if ok {
                assert!(result.is_ok(), "{} items should pass", n);
            } else {
                let count = match result {
                    Err(ValidationError::InvalidItemCount { count, .. }) => count,
                    other => panic!("{} items should fail, got {:?}", n, other),
                };
                assert_eq!(count, n);
            }
        }
    }

    #[test]
    fn single_requires_exactly_one() {
        let stager = InputStager::new(1024);
        assert!(stager.validate(JobType::SingleDocument, &pdfs(1), None).is_ok());
        assert!(stager.validate(JobType::SingleDocument, &pdfs(0), None).is_err());
        assert!(stager.validate(JobType::SingleDocument, &pdfs(2), None).is_err());
    }

    #[test]
    fn rejects_non_pdf() {
        let stager = InputStager::new(1024);
        let items = vec![UploadedItem::new("a.png", "image/png", vec![1, 2, 3])];
        let err = stager.validate(JobType::SingleDocument, &items, None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidContentType { index: 0, .. }));
    }

    #[test]
    fn accepts_content_type_parameters() {
        let stager = InputStager::new(1024);
        let items = vec![UploadedItem::new("a.pdf", "Application/PDF; charset=binary", vec![1])];
        assert!(stager.validate(JobType::SingleDocument, &items, None).is_ok());
    }

    #[test]
    fn rejects_oversized_item() {
        let stager = InputStager::new(4);
        let items = vec![UploadedItem::pdf("big.pdf", vec![0u8; 5])];
        let err = stager.validate(JobType::SingleDocument, &items, None).unwrap_err();
        assert!(matches!(err, ValidationError::PayloadTooLarge { size: 5, limit: 4, .. }));
    }

    #[test]
    fn batch_requires_persona_and_task() {
        let stager = InputStager::new(1024);
        let items = pdfs(3);

        let err = stager
            .validate(JobType::DocumentBatch, &items, Some(&BatchContext::new(" ", "Plan")))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingContext { field: "persona" });

        let err = stager
            .validate(JobType::DocumentBatch, &items, Some(&BatchContext::new("P", "")))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingContext { field: "task" });

        assert!(stager.validate(JobType::DocumentBatch, &items, None).is_err());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\report 1.pdf"), "report_1.pdf");
        assert_eq!(sanitize_file_name(".."), "document.pdf");
        assert_eq!(sanitize_file_name(""), "document.pdf");
    }

    #[tokio::test]
    async fn stage_writes_index_qualified_files() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), Duration::from_secs(5));
        let ws = manager.allocate(JobId::new()).await.unwrap();

        let items = vec![
            UploadedItem::pdf("same.pdf", b"one".to_vec()),
            UploadedItem::pdf("same.pdf", b"two".to_vec()),
            UploadedItem::pdf("same.pdf", b"three".to_vec()),
        ];
        let staged = InputStager::new(1024).stage(&manager, &ws, &items).await.unwrap();

        assert_eq!(staged.len(), 3);
        assert!(staged.paths[0].ends_with("doc_0_same.pdf"));
        assert!(staged.paths[2].ends_with("doc_2_same.pdf"));
        assert_eq!(std::fs::read(&staged.paths[1]).unwrap(), b"two");
    }

    #[tokio::test]
    async fn stage_failure_rolls_back() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), Duration::from_secs(5));
        let ws = manager.allocate(JobId::new()).await.unwrap();

        // 让第二个文件的目标路径变成一个目录，写入必然失败
        std::fs::create_dir(ws.path().join("doc_1_b.pdf")).unwrap();
        let items = vec![
            UploadedItem::pdf("a.pdf", b"a".to_vec()),
            UploadedItem::pdf("b.pdf", b"b".to_vec()),
        ];

        let err = InputStager::new(1024).stage(&manager, &ws, &items).await.unwrap_err();
        assert!(matches!(err, JobError::Staging { .. }));
        assert!(!ws.path().exists());
        assert!(ws.is_released());
    }
}
