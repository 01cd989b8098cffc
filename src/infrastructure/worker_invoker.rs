//! worker 调用器 - 基础设施层
//!
//! 持有子进程的整个生命周期，只暴露"带截止时间运行一次"的能力：
//! - 子进程放进独立进程组，超时时整组 SIGKILL
//! - stdout / stderr 分块读取，每个流最多保留 `max_output_bytes`
//! - 每次调用恰好产生一个 `WorkerOutcome`

use std::ffi::OsString;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::WorkerCommand;
use crate::error::JobError;

const READ_CHUNK: usize = 8 * 1024;

/// 一次调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// 退出码 0
    Success {
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },
    /// 非 0 退出或被信号杀死
    WorkerError {
        exit_code: Option<i32>,
        stderr: String,
        elapsed: Duration,
    },
    /// 超过截止时间，已强制终止；部分输出被丢弃
    TimedOut { elapsed: Duration },
    /// 进程根本没能启动
    LaunchError { message: String },
}

impl WorkerOutcome {
    /// 成功时取出 stdout，其余映射为对应的任务错误
    pub fn into_stdout(self) -> Result<String, JobError> {
        match self {
            WorkerOutcome::Success { stdout, .. } => Ok(stdout),
            WorkerOutcome::WorkerError {
                exit_code, stderr, ..
            } => Err(JobError::Worker {
                exit_code,
                stderr: stderr.trim().to_string(),
            }),
            WorkerOutcome::TimedOut { elapsed } => Err(JobError::TimedOut { after: elapsed }),
            WorkerOutcome::LaunchError { message } => Err(JobError::Launch { message }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkerOutcome::Success { .. } => "Success",
            WorkerOutcome::WorkerError { .. } => "WorkerError",
            WorkerOutcome::TimedOut { .. } => "TimedOut",
            WorkerOutcome::LaunchError { .. } => "LaunchError",
        }
    }
}

/// 读取到的单个输出流
#[derive(Debug, Default)]
struct CapturedStream {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedStream {
    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// worker 调用器
///
/// 职责：
/// - 启动子进程并强制截止时间
/// - 收集输出
/// - 不认识任务类型和工作区
#[derive(Debug, Clone)]
pub struct WorkerInvoker {
    max_output_bytes: usize,
}

impl WorkerInvoker {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// 运行 worker 直到退出或到达 `deadline`
    ///
    /// # 参数
    /// - `command`: 程序及固定参数
    /// - `job_args`: 追加的任务位置参数
    /// - `deadline`: 绝对截止时间
    pub async fn invoke(
        &self,
        command: &WorkerCommand,
        job_args: &[OsString],
        deadline: Instant,
    ) -> WorkerOutcome {
        let started = Instant::now();

        let mut child = match spawn_worker(command, job_args) {
            Ok(child) => child,
            Err(e) => {
                return WorkerOutcome::LaunchError {
                    message: format!("无法启动 {}: {}", command.program, e),
                }
            }
        };
        let pid = child.id();
        let mut group = ProcessGroup { pgid: pid };
        debug!("worker 已启动: {} (pid: {:?})", command.program, pid);

        let mut stdout_task = spawn_capture(child.stdout.take(), self.max_output_bytes);
        let mut stderr_task = spawn_capture(child.stderr.take(), self.max_output_bytes);

        let run = async {
            let status = child.wait().await?;
            // 主进程已退出：先杀掉仍持有管道的后代进程，再读完剩余输出
            group.kill();
            let stdout = join_capture(&mut stdout_task, "stdout").await;
            let stderr = join_capture(&mut stderr_task, "stderr").await;
            Ok::<(ExitStatus, CapturedStream, CapturedStream), io::Error>((status, stdout, stderr))
        };

        let finished = tokio::select! {
            res = run => Some(res),
            _ = tokio::time::sleep_until(deadline) => None,
        };
        let elapsed = started.elapsed();

        match finished {
            None => {
                warn!(
                    "⏱️ worker 超时 ({:.2}s)，强制终止进程组 (pid: {:?})",
                    elapsed.as_secs_f64(),
                    pid
                );
                terminate_tree(&mut group, &mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                WorkerOutcome::TimedOut { elapsed }
            }
            Some(Err(e)) => {
                terminate_tree(&mut group, &mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                WorkerOutcome::WorkerError {
                    exit_code: None,
                    stderr: format!("等待 worker 退出失败: {}", e),
                    elapsed,
                }
            }
            Some(Ok((status, stdout, stderr))) => {
                if stdout.truncated || stderr.truncated {
                    warn!(
                        "worker 输出超过 {} 字节，已截断 (stdout: {}, stderr: {})",
                        self.max_output_bytes, stdout.truncated, stderr.truncated
                    );
                }

                if status.success() {
                    WorkerOutcome::Success {
                        stdout: stdout.into_string(),
                        stderr: stderr.into_string(),
                        elapsed,
                    }
                } else {
                    WorkerOutcome::WorkerError {
                        exit_code: status.code(),
                        stderr: stderr.into_string(),
                        elapsed,
                    }
                }
            }
        }
    }
}

fn spawn_worker(command: &WorkerCommand, job_args: &[OsString]) -> io::Result<Child> {
    let mut std_cmd = std::process::Command::new(&command.program);
    std_cmd
        .args(&command.args)
        .args(job_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // 新进程组，组 id 即 worker pid
        std_cmd.process_group(0);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);
    cmd.spawn()
}

fn spawn_capture<R>(reader: Option<R>, limit: usize) -> JoinHandle<io::Result<CapturedStream>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match reader {
            Some(reader) => capture_stream(reader, limit).await,
            None => Ok(CapturedStream::default()),
        }
    })
}

/// 分块读取直到 EOF；超出上限的部分继续读出但丢弃，避免写端阻塞
async fn capture_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> io::Result<CapturedStream> {
    let mut captured = CapturedStream::default();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok(captured)
}

async fn join_capture(
    task: &mut JoinHandle<io::Result<CapturedStream>>,
    stream: &str,
) -> CapturedStream {
    match task.await {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!("读取 worker {} 失败: {}", stream, e);
            CapturedStream::default()
        }
        Err(e) => {
            warn!("worker {} 读取任务异常: {}", stream, e);
            CapturedStream::default()
        }
    }
}

/// worker 所在的进程组
///
/// drop 时整组 SIGKILL：调用方取消 `invoke` 时 `kill_on_drop` 只会杀死直接子进程
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    /// 只发送一次，之后 drop 不再重复
    fn kill(&mut self) {
        kill_process_group(self.pgid.take());
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// 终止 worker 及其所有后代，并回收僵尸进程
async fn terminate_tree(group: &mut ProcessGroup, child: &mut Child) {
    group.kill();
    if let Err(e) = child.kill().await {
        debug!("kill worker 失败（可能已退出）: {}", e);
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("终止进程组 {} 失败: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
