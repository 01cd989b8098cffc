//! # docjob
//!
//! 文档处理任务编排：把上传的文档暂存到独立工作区，带截止时间调用外部 worker，
//! 解析其 JSON 输出，并保证每条退出路径都清理资源
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `WorkspaceManager` - 每个任务一个目录，释放幂等
//! - `WorkerInvoker` - 启动 worker、强制截止时间、收集输出
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 只处理单个任务的某一步
//! - `InputStager` - 校验并暂存输入
//! - `ResultDecoder` - 按任务类型解析输出
//! - `ConstraintEvaluator` - 时间 / 格式提示
//! - `ModelGuard` - 模型资源检查
//!
//! ### ③ 流程层（Workflow）
//! - `JobCtx` - 日志上下文（job id + 类型）
//! - `JobFlow` - 状态机驱动（validate → stage → dispatch → decode → evaluate → release）
//!
//! ### ④ 编排层（Orchestration）
//! - `JobOrchestrator` - `submit` 入口，并发运行任务
//! - `App` - CLI 使用的应用生命周期

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, WorkerCommand};
pub use error::{ErrorKind, JobError, JobResult, ValidationError};
pub use infrastructure::{WorkerInvoker, WorkerOutcome, WorkspaceManager};
pub use models::{BatchContext, JobResponse, JobState, JobType, UploadedItem};
pub use orchestrator::{App, JobOrchestrator};
pub use workflow::{JobCtx, JobFlow, JobRequest};
