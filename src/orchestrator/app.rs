//! 应用生命周期 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：输出启动信息、准备工作区根目录、创建编排器
//! 2. **运行**：提交一个或多个任务
//! 3. **统计**：汇总成功 / 失败数量

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::models::JobResponse;
use crate::orchestrator::JobOrchestrator;
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::JobRequest;

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: JobOrchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        tokio::fs::create_dir_all(&config.temp_root)
            .await
            .with_context(|| format!("无法创建工作区根目录: {}", config.temp_root.display()))?;

        if !config.model_dir.exists() {
            warn!(
                "⚠️ 模型目录不存在: {}，DocumentBatch 任务将会失败",
                config.model_dir.display()
            );
        }

        let orchestrator = JobOrchestrator::new(&config);
        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// 运行一个任务
    pub async fn run(&self, request: JobRequest) -> Result<JobResponse> {
        let mut responses = self.run_all(vec![request]).await?;
        responses
            .pop()
            .context("编排器没有返回响应")
    }

    /// 并发运行多个任务并输出统计
    pub async fn run_all(&self, requests: Vec<JobRequest>) -> Result<Vec<JobResponse>> {
        if requests.is_empty() {
            warn!("⚠️ 没有待处理的任务");
            return Ok(Vec::new());
        }

        info!(
            "📋 共 {} 个任务，worker 并发上限 {}",
            requests.len(),
            self.config.max_concurrent_workers
        );

        let responses = self.orchestrator.submit_all(requests).await;

        let success = responses.iter().filter(|r| r.success).count();
        print_final_stats(success, responses.len() - success, responses.len());

        Ok(responses)
    }
}
