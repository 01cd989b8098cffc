//! tracing 初始化

use tracing_subscriber::EnvFilter;

/// 安装全局 subscriber
///
/// 优先使用 `RUST_LOG`，否则 verbose 时为 `debug`，默认 `info`。重复调用是安全的
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
