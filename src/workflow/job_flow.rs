//! 任务处理流程 - 流程层
//!
//! 核心职责：定义"一个任务"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验输入（+ DocumentBatch 的模型检查）
//! 2. 分配工作区并暂存输入
//! 3. 占用 worker 名额，派发 worker
//! 4. 解析输出
//! 5. 评估约束
//! 6. 释放工作区（无论走到哪一步都会执行）

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{JobError, JobResult};
use crate::infrastructure::{Workspace, WorkerInvoker, WorkspaceManager};
use crate::models::{
    BatchContext, ConstraintReport, DecodedResult, Job, JobId, JobState, JobType, StagedInputs,
    UploadedItem,
};
use crate::services::{ConstraintEvaluator, InputStager, ModelGuard, ResultDecoder};
use crate::utils::logging::truncate_text;
use crate::workflow::job_ctx::JobCtx;

/// 一次提交
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_type: JobType,
    pub items: Vec<UploadedItem>,
    /// 仅 DocumentBatch 使用
    pub context: Option<BatchContext>,
}

impl JobRequest {
    pub fn single(item: UploadedItem) -> Self {
        Self {
            job_type: JobType::SingleDocument,
            items: vec![item],
            context: None,
        }
    }

    pub fn batch(items: Vec<UploadedItem>, context: BatchContext) -> Self {
        Self {
            job_type: JobType::DocumentBatch,
            items,
            context: Some(context),
        }
    }
}

/// 成功终态携带的内容
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub result: DecodedResult,
    pub constraints: ConstraintReport,
}

/// 流程结束后的报告
#[derive(Debug)]
pub struct FlowReport {
    pub job_id: JobId,
    pub job_type: JobType,
    pub final_state: JobState,
    /// 从受理到终态的耗时
    pub elapsed: Duration,
    pub documents: usize,
    pub outcome: JobResult<CompletedJob>,
}

/// 任务处理流程
///
/// - 编排单个任务的各个步骤
/// - 决定何时失败、进入哪个终态
/// - 保证工作区只释放一次
pub struct JobFlow {
    config: Config,
    workspaces: WorkspaceManager,
    stager: InputStager,
    invoker: WorkerInvoker,
    decoder: ResultDecoder,
    evaluator: ConstraintEvaluator,
    model_guard: ModelGuard,
    worker_slots: Arc<Semaphore>,
}

impl JobFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            workspaces: WorkspaceManager::new(&config.temp_root, config.cleanup_timeout()),
            stager: InputStager::new(config.max_item_bytes),
            invoker: WorkerInvoker::new(config.max_output_bytes),
            decoder: ResultDecoder::new(),
            evaluator: ConstraintEvaluator::with_budgets(
                config.budget_for(JobType::SingleDocument),
                config.budget_for(JobType::DocumentBatch),
            ),
            model_guard: ModelGuard::new(&config.model_dir, &config.model_name),
            worker_slots: Arc::new(Semaphore::new(config.max_concurrent_workers.max(1))),
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// 执行一个任务直到终态
    ///
    /// 不返回错误：所有失败都已分类放进 `FlowReport::outcome`
    pub async fn run(&self, job_id: JobId, request: &JobRequest, started: Instant) -> FlowReport {
        let mut job = Job::with_id(job_id, request.job_type);
        let ctx = JobCtx::new(job.id(), request.job_type, request.items.len());
        info!("{} 📥 受理任务，共 {} 个文件", ctx, ctx.item_count);

        let mut workspace: Option<Workspace> = None;
        let outcome = self.execute(&mut job, request, &ctx, &mut workspace, started).await;

        let terminal = match &outcome {
            Ok(_) => JobState::Completed,
            Err(e) => e.terminal_state(),
        };
        if let Err(e) = job.advance(terminal) {
            error!("{} ❌ 无法进入终态: {}", ctx, e);
        }

        if let Some(ws) = workspace.as_ref() {
            if let Err(e) = self.workspaces.release(ws).await {
                warn!("{} ⚠️ 工作区清理失败: {}", ctx, e);
            }
        }

        let elapsed = started.elapsed();
        match &outcome {
            Ok(done) => info!(
                "{} ✅ 完成 ({:.2}s, timeLimit: {}, formatValid: {})",
                ctx,
                elapsed.as_secs_f64(),
                done.constraints.time_limit,
                done.constraints.format_valid
            ),
            Err(e) => warn!(
                "{} ❌ {} ({:?}, {:.2}s): {}",
                ctx,
                job.state(),
                e.kind(),
                elapsed.as_secs_f64(),
                truncate_text(&e.to_string(), 300)
            ),
        }

        FlowReport {
            job_id: job.id(),
            job_type: job.job_type(),
            final_state: job.state(),
            elapsed,
            documents: request.items.len(),
            outcome,
        }
    }

    async fn execute(
        &self,
        job: &mut Job,
        request: &JobRequest,
        ctx: &JobCtx,
        workspace: &mut Option<Workspace>,
        started: Instant,
    ) -> JobResult<CompletedJob> {
        // ========== 步骤 1: 校验 ==========
        self.stager
            .validate(request.job_type, &request.items, request.context.as_ref())?;
        if request.job_type == JobType::DocumentBatch {
            self.model_guard.ensure_available().await?;
        }
        job.advance(JobState::Validated)?;

        // ========== 步骤 2: 暂存 ==========
        let ws = self
            .workspaces
            .allocate(job.id())
            .await
            .map_err(|e| JobError::staging(self.workspaces.root(), e))?;
        let ws = workspace.insert(ws);
        let staged = self.stager.stage(&self.workspaces, ws, &request.items).await?;
        job.advance(JobState::Staged)?;
        debug!("{} 已暂存 {} 个文件", ctx, staged.len());

        // ========== 步骤 3: 派发 ==========
        let stdout = self.dispatch(job, request, ctx, &staged).await?;

        // ========== 步骤 4: 解析 ==========
        let result = self.decoder.decode(request.job_type, &stdout)?;

        // ========== 步骤 5: 约束 ==========
        let constraints = self
            .evaluator
            .evaluate(request.job_type, started.elapsed(), &result);

        Ok(CompletedJob {
            result,
            constraints,
        })
    }

    async fn dispatch(
        &self,
        job: &mut Job,
        request: &JobRequest,
        ctx: &JobCtx,
        staged: &StagedInputs,
    ) -> JobResult<String> {
        if self.worker_slots.available_permits() == 0 {
            info!("{} ⏳ worker 名额已满，排队等待", ctx);
        }
        let _permit = self
            .worker_slots
            .acquire()
            .await
            .map_err(|e| JobError::launch(format!("worker 名额不可用: {}", e)))?;

        let command = self.config.worker_for(request.job_type);
        let args = self.worker_args(request, staged);
        let deadline = Instant::now() + self.config.deadline_for(request.job_type);

        job.advance(JobState::Dispatched)?;
        info!("{} 🚀 派发 worker: {}", ctx, command.program);
        if self.config.verbose_logging {
            debug!("{} argv: {:?} {:?}", ctx, command.args, args);
        }

        let outcome = self.invoker.invoke(command, &args, deadline).await;
        info!("{} worker 结束: {}", ctx, outcome.label());

        if self.config.verbose_logging {
            if let crate::infrastructure::WorkerOutcome::Success { stderr, .. } = &outcome {
                if !stderr.trim().is_empty() {
                    info!("{} worker stderr: {}", ctx, truncate_text(stderr.trim(), 500));
                }
            }
        }

        outcome.into_stdout()
    }

    /// 位置参数
    ///
    /// - SingleDocument: `<file>`
    /// - DocumentBatch: `<model_dir> <persona> <task> <file>...`
    fn worker_args(&self, request: &JobRequest, staged: &StagedInputs) -> Vec<OsString> {
        let mut args = Vec::with_capacity(staged.len() + 3);
        if let (JobType::DocumentBatch, Some(context)) = (request.job_type, &request.context) {
            args.push(self.model_guard.model_dir().as_os_str().to_os_string());
            args.push(OsString::from(&context.persona));
            args.push(OsString::from(&context.task));
        }
        args.extend(staged.paths.iter().map(|p| p.as_os_str().to_os_string()));
        args
    }
}
