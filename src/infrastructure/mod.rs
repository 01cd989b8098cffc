//! 基础设施层
//!
//! 持有稀缺资源（工作区目录、worker 进程），只暴露能力，不认识任务流程

pub mod worker_invoker;
pub mod workspace;

pub use worker_invoker::{WorkerInvoker, WorkerOutcome};
pub use workspace::{Workspace, WorkspaceManager};
