use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use docjob::models::PDF_CONTENT_TYPE;
use docjob::{logger, App, BatchContext, Config, JobRequest, UploadedItem};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Run document jobs through an external worker",
    long_about = None
)]
struct Cli {
    /// TOML config file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the outline of a single document
    Single {
        /// Input PDF
        file: PathBuf,
    },
    /// Rank sections across 3-15 documents for a persona and task
    Batch {
        #[arg(long)]
        persona: String,
        #[arg(long)]
        task: String,
        /// Input PDFs
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logger::init(config.verbose_logging);

    let request = match cli.command {
        Commands::Single { file } => JobRequest::single(read_item(&file).await?),
        Commands::Batch {
            persona,
            task,
            files,
        } => {
            let mut items = Vec::with_capacity(files.len());
            for file in &files {
                items.push(read_item(file).await?);
            }
            JobRequest::batch(items, BatchContext::new(persona, task))
        }
    };

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    let response = app.run(request).await?;

    println!("{}", response.to_json()?);
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

/// 读取本地文件，按扩展名推断内容类型
async fn read_item(path: &Path) -> Result<UploadedItem> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("无法读取文件: {}", path.display()))?;

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    let content_type = if is_pdf {
        PDF_CONTENT_TYPE
    } else {
        "application/octet-stream"
    };

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    Ok(UploadedItem::new(name, content_type, bytes))
}
