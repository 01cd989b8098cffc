//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `job_orchestrator` - 任务编排器
//! - 唯一入口 `submit(jobType, items, context?) → response`
//! - 每个任务一个 tokio 任务，彼此之间不共享可变状态
//! - 把流程报告组装为调用方响应
//!
//! ### `app` - 应用生命周期
//! - 初始化日志和工作区根目录
//! - 运行一次提交并输出统计
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! job_orchestrator (处理 Vec<JobRequest>)
//!     ↓
//! workflow::JobFlow (处理单个任务)
//!     ↓
//! services (能力层：stage / decode / evaluate / model)
//!     ↓
//! infrastructure (基础设施：WorkspaceManager / WorkerInvoker)
//! ```

pub mod app;
pub mod job_orchestrator;

pub use app::App;
pub use job_orchestrator::JobOrchestrator;
