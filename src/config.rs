use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::JobType;

/// worker 启动命令
///
/// 任务相关的位置参数追加在 `args` 之后
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 所有任务工作区的根目录
    pub temp_root: PathBuf,
    /// SingleDocument worker
    pub single_worker: WorkerCommand,
    /// DocumentBatch worker
    pub batch_worker: WorkerCommand,
    /// 模型目录，原样传给 batch worker
    pub model_dir: PathBuf,
    /// 模型目录下必须存在的模型名
    pub model_name: String,
    /// SingleDocument 硬截止时间（秒）
    pub single_deadline_secs: u64,
    /// DocumentBatch 硬截止时间（秒）
    pub batch_deadline_secs: u64,
    /// SingleDocument 时间预算（毫秒），只影响 `timeLimit` 标记
    pub single_budget_ms: u64,
    /// DocumentBatch 时间预算（毫秒）
    pub batch_budget_ms: u64,
    /// 同时运行的 worker 进程上限
    pub max_concurrent_workers: usize,
    /// 单个上传文件大小上限
    pub max_item_bytes: u64,
    /// 每个输出流最多保留的字节数
    pub max_output_bytes: usize,
    /// 删除工作区的超时（秒）
    pub cleanup_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("docjob"),
            single_worker: WorkerCommand::new(
                "python3",
                vec!["scripts/process_single.py".to_string()],
            ),
            batch_worker: WorkerCommand::new(
                "python3",
                vec!["scripts/process_batch.py".to_string()],
            ),
            model_dir: PathBuf::from("models"),
            model_name: "all-MiniLM-L6-v2".to_string(),
            single_deadline_secs: 30,
            batch_deadline_secs: 120,
            single_budget_ms: JobType::SingleDocument.time_budget().as_millis() as u64,
            batch_budget_ms: JobType::DocumentBatch.time_budget().as_millis() as u64,
            max_concurrent_workers: 4,
            max_item_bytes: 50 * 1024 * 1024,
            max_output_bytes: 16 * 1024 * 1024,
            cleanup_timeout_secs: 5,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省的键保留默认值；环境变量优先级更高
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            temp_root: env_var("DOCJOB_TEMP_ROOT")
                .map(PathBuf::from)
                .unwrap_or(base.temp_root),
            single_worker: WorkerCommand {
                program: env_var("DOCJOB_SINGLE_WORKER").unwrap_or(base.single_worker.program),
                args: env_args("DOCJOB_SINGLE_WORKER_ARGS").unwrap_or(base.single_worker.args),
            },
            batch_worker: WorkerCommand {
                program: env_var("DOCJOB_BATCH_WORKER").unwrap_or(base.batch_worker.program),
                args: env_args("DOCJOB_BATCH_WORKER_ARGS").unwrap_or(base.batch_worker.args),
            },
            model_dir: env_var("DOCJOB_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.model_dir),
            model_name: env_var("DOCJOB_MODEL_NAME").unwrap_or(base.model_name),
            single_deadline_secs: env_parse("DOCJOB_SINGLE_DEADLINE_SECS")
                .unwrap_or(base.single_deadline_secs),
            batch_deadline_secs: env_parse("DOCJOB_BATCH_DEADLINE_SECS")
                .unwrap_or(base.batch_deadline_secs),
            single_budget_ms: env_parse("DOCJOB_SINGLE_BUDGET_MS").unwrap_or(base.single_budget_ms),
            batch_budget_ms: env_parse("DOCJOB_BATCH_BUDGET_MS").unwrap_or(base.batch_budget_ms),
            max_concurrent_workers: env_parse("DOCJOB_MAX_CONCURRENT_WORKERS")
                .unwrap_or(base.max_concurrent_workers),
            max_item_bytes: env_parse("DOCJOB_MAX_ITEM_BYTES").unwrap_or(base.max_item_bytes),
            max_output_bytes: env_parse("DOCJOB_MAX_OUTPUT_BYTES").unwrap_or(base.max_output_bytes),
            cleanup_timeout_secs: env_parse("DOCJOB_CLEANUP_TIMEOUT_SECS")
                .unwrap_or(base.cleanup_timeout_secs),
            verbose_logging: env_parse("DOCJOB_VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
        }
    }

    pub fn worker_for(&self, job_type: JobType) -> &WorkerCommand {
        match job_type {
            JobType::SingleDocument => &self.single_worker,
            JobType::DocumentBatch => &self.batch_worker,
        }
    }

    /// worker 的硬截止时长
    pub fn deadline_for(&self, job_type: JobType) -> Duration {
        match job_type {
            JobType::SingleDocument => Duration::from_secs(self.single_deadline_secs),
            JobType::DocumentBatch => Duration::from_secs(self.batch_deadline_secs),
        }
    }

    /// 建议时间预算，超出只标记 `timeLimit: false`
    pub fn budget_for(&self, job_type: JobType) -> Duration {
        match job_type {
            JobType::SingleDocument => Duration::from_millis(self.single_budget_ms),
            JobType::DocumentBatch => Duration::from_millis(self.batch_budget_ms),
        }
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

/// 空白分隔的参数列表
fn env_args(name: &str) -> Option<Vec<String>> {
    env_var(name).map(|v| v.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_limits() {
        let config = Config::default();
        assert_eq!(config.max_item_bytes, 50 * 1024 * 1024);
        assert_eq!(config.deadline_for(JobType::SingleDocument), Duration::from_secs(30));
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.budget_for(JobType::SingleDocument), Duration::from_secs(10));
        assert_eq!(config.budget_for(JobType::DocumentBatch), Duration::from_secs(60));
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
single_deadline_secs = 7
max_concurrent_workers = 2

[batch_worker]
program = "/usr/local/bin/rank"
args = ["--fast"]
"#
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.single_deadline_secs, 7);
        assert_eq!(config.max_concurrent_workers, 2);
        assert_eq!(config.batch_worker.program, "/usr/local/bin/rank");
        assert_eq!(config.batch_worker.args, vec!["--fast".to_string()]);
        assert_eq!(config.batch_deadline_secs, 120);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::from_toml_file(Path::new("/definitely/not/here.toml"));
        assert!(result.is_err());
    }
}
