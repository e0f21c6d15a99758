//! rsfingerprint 命令行入口
//! 加载指纹库，从文件读取单个响应并输出JSON格式的识别结果

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rsfingerprint::{ConfigManager, FingerprintDetector, Response};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 本地JSON指纹库（未指定时使用本地缓存或远程指纹库）
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// 响应体文件
    #[arg(short, long)]
    body: Option<PathBuf>,

    /// 响应头，格式 "Name: value"，可重复
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// 状态码
    #[arg(short, long)]
    status: Option<u16>,

    /// 预先计算好的favicon哈希，可重复
    #[arg(long = "favicon-hash")]
    favicon_hashes: Vec<String>,

    /// 响应体大小上限（字节）
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// 格式化输出JSON
    #[arg(long)]
    pretty: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("无效响应头 {:?}，应为 \"Name: value\"", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("无效响应头 {:?}：名称为空", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut builder = ConfigManager::custom().verbose(cli.verbose);
    if let Some(path) = cli.corpus.clone() {
        builder = builder.corpus_path(path);
    }
    if let Some(limit) = cli.max_body_bytes {
        builder = builder.max_body_bytes(limit);
    }
    let config = builder.build();

    let body = match &cli.body {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("读取响应体文件 {} 失败", path.display()))?,
        None => Vec::new(),
    };

    let mut response = Response::from_bytes(&body);
    if let Some(status) = cli.status {
        response = response.with_status(status);
    }
    for raw in &cli.headers {
        let (name, value) = parse_header(raw)?;
        response = response.with_header(name, value);
    }
    for hash in cli.favicon_hashes {
        response = response.with_favicon_hash(hash);
    }

    let detector = FingerprintDetector::new(config)
        .await
        .context("加载指纹库失败")?;
    tracing::debug!(
        "指纹库就绪：可用模板{}个，拒绝{}个",
        detector.store().len(),
        detector.store().rejected().len()
    );

    let results = detector.try_scan(&response).context("扫描失败")?;
    let output = if cli.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", output);

    Ok(())
}
