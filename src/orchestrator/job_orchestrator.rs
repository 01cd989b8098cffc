//! 任务编排器 - 编排层
//!
//! 展示层只调用这里的 `submit`，并原样渲染返回的 `JobResponse`

use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::error;

use crate::config::Config;
use crate::error::ErrorKind;
use crate::models::{BatchContext, JobId, JobResponse, JobState, JobType, UploadedItem};
use crate::workflow::{FlowReport, JobFlow, JobRequest};

/// 任务编排器
///
/// 可以廉价 clone，多个 clone 共享同一个 worker 名额池
#[derive(Clone)]
pub struct JobOrchestrator {
    flow: Arc<JobFlow>,
}

impl JobOrchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            flow: Arc::new(JobFlow::new(config)),
        }
    }

    /// 提交一个任务并等待终态
    pub async fn submit(
        &self,
        job_type: JobType,
        items: Vec<UploadedItem>,
        context: Option<BatchContext>,
    ) -> JobResponse {
        self.submit_request(JobRequest {
            job_type,
            items,
            context,
        })
        .await
    }

    pub async fn submit_request(&self, request: JobRequest) -> JobResponse {
        self.run_with_id(JobId::new(), request).await
    }

    async fn run_with_id(&self, job_id: JobId, request: JobRequest) -> JobResponse {
        let started = Instant::now();
        let report = self.flow.run(job_id, &request, started).await;
        JobResponse::from(report)
    }

    /// 并发提交多个任务，每个任务一个 tokio 任务
    ///
    /// id 在派生任务之前分配，任务 panic 时兜底响应仍能对上日志和工作区。
    /// 返回顺序与请求顺序一致
    pub async fn submit_all(&self, requests: Vec<JobRequest>) -> Vec<JobResponse> {
        let jobs: Vec<(JobId, JobType)> = requests
            .iter()
            .map(|r| (JobId::new(), r.job_type))
            .collect();
        let handles = requests.into_iter().zip(&jobs).map(|(request, &(job_id, _))| {
            let this = self.clone();
            tokio::spawn(async move { this.run_with_id(job_id, request).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(jobs)
            .map(|(joined, (job_id, job_type))| match joined {
                Ok(response) => response,
                Err(e) => {
                    error!("[job {}] ❌ 任务异常终止: {}", job_id, e);
                    JobResponse::aborted(job_id, job_type, e.to_string())
                }
            })
            .collect()
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        self.flow.workspaces().root()
    }
}

impl From<FlowReport> for JobResponse {
    fn from(report: FlowReport) -> Self {
        let is_batch = report.job_type == JobType::DocumentBatch;
        let documents_processed = is_batch.then_some(report.documents);

        match report.outcome {
            Ok(done) => JobResponse {
                success: true,
                job_id: report.job_id,
                state: report.final_state,
                processing_time: report.elapsed.as_secs_f64(),
                extracted_sections: done.result.extracted_section_count(),
                result: Some(done.result),
                constraints_met: Some(done.constraints),
                error: None,
                error_kind: None,
                documents_processed,
            },
            Err(e) => JobResponse {
                success: false,
                job_id: report.job_id,
                state: report.final_state,
                processing_time: report.elapsed.as_secs_f64(),
                result: None,
                constraints_met: None,
                error: Some(e.user_message()),
                error_kind: Some(e.kind()),
                documents_processed,
                extracted_sections: None,
            },
        }
    }
}

impl JobResponse {
    /// 任务本身异常终止（panic）时的兜底响应
    pub fn aborted(job_id: JobId, job_type: JobType, detail: impl Into<String>) -> Self {
        JobResponse {
            success: false,
            job_id,
            state: JobState::Failed,
            processing_time: 0.0,
            result: None,
            constraints_met: None,
            error: Some(format!("Processing failed: {}", detail.into())),
            error_kind: Some(ErrorKind::Internal),
            documents_processed: (job_type == JobType::DocumentBatch).then_some(0),
            extracted_sections: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_response_keeps_job_id() {
        let id = JobId::new();
        let response = JobResponse::aborted(id, JobType::DocumentBatch, "task panicked");

        assert_eq!(response.job_id, id);
        assert_eq!(response.state, JobState::Failed);
        assert_eq!(response.error_kind, Some(ErrorKind::Internal));
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.documents_processed, Some(0));
        assert!(response
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Processing failed: ")));
    }
}
