use allerscan_core::{
    collect_dir_files, import_catalog, load_catalog, AllergenCatalog, AllergenInput, AllergenStore, CommandExtractor,
    HistoryStore, JsonlHistory, NoHistory, ScanOptions, ScanService, ServiceConfig, Severity,
};
use allerscan_server::AppState;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "allerscan", version, about = "Allergen keyword scanner")]
struct Cli {
    /// 配置文件（TOML）；缺失时使用默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 数据目录（覆盖配置文件）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 管理过敏原
    #[command(subcommand)]
    Allergens(AllergenCommand),

    /// 扫描文本或文件
    Scan {
        /// 选中的过敏原 id（可重复）
        #[arg(long = "allergen", value_name = "ID")]
        allergens: Vec<String>,

        /// 直接扫描的文本
        #[arg(long, conflicts_with_all = ["files", "dir"])]
        text: Option<String>,

        /// 待扫描文件（图片 / PDF / Word / txt，可重复）
        #[arg(long = "file", value_name = "PATH", conflicts_with = "dir")]
        files: Vec<PathBuf>,

        /// 扫描目录下的所有文件（单层）
        #[arg(long)]
        dir: Option<PathBuf>,

        /// 线程数（多文件时并行；"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 最大扫描文件大小（单位字节）
        #[arg(long)]
        max_file_size: Option<u64>,

        /// 输出文件；默认写到 stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 查看最近的扫描历史
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// 启动 HTTP 服务
    Serve {
        /// 监听地址（覆盖配置文件）
        #[arg(long)]
        listen: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AllergenCommand {
    /// 新增过敏原
    Add(AllergenArgs),
    /// 列出全部过敏原
    List,
    /// 整体更新过敏原
    Update {
        id: String,
        #[command(flatten)]
        fields: AllergenArgs,
    },
    /// 删除过敏原
    Delete { id: String },
    /// 从 TOML 目录文件导入（同名跳过）
    Import { catalog: PathBuf },
}

#[derive(Args, Debug)]
struct AllergenArgs {
    #[arg(long)]
    name: String,
    /// HIGH / MEDIUM / LOW
    #[arg(long)]
    severity: String,
    /// 触发关键词（可重复）
    #[arg(long = "keyword", value_name = "KEYWORD", required = true)]
    keywords: Vec<String>,
}

impl AllergenArgs {
    fn into_input(self) -> Result<AllergenInput> {
        let severity: Severity = self.severity.parse()?;
        Ok(AllergenInput { name: self.name, severity, keywords: self.keywords })
    }
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let store: Arc<dyn AllergenStore> =
        Arc::new(AllergenCatalog::open(&config.allergens_path()).context("open allergen store")?);
    let history: Arc<dyn HistoryStore> = if config.history {
        Arc::new(JsonlHistory::new(&config.history_path()))
    } else {
        Arc::new(NoHistory)
    };
    let service = ScanService::new(store, history);

    match cli.command {
        Commands::Allergens(cmd) => run_allergens(&service, cmd)?,
        Commands::Scan { allergens, text, files, dir, threads, max_file_size, output } => {
            if allergens.is_empty() {
                bail!("no allergens selected for scan (use --allergen <ID>)");
            }
            if let Some(text) = text {
                let result = service.scan(&text, &allergens)?;
                let mut out = open_output(output.as_deref())?;
                serde_json::to_writer_pretty(&mut out, &result)?;
                writeln!(out)?;
                out.flush()?;
            } else {
                let paths = match dir {
                    Some(dir) => collect_dir_files(&dir),
                    None => files,
                };
                if paths.is_empty() {
                    bail!("nothing to scan: pass --text, --file or --dir");
                }
                info!(files = paths.len(), "starting scan");
                let extractor = CommandExtractor::new(config.extract.clone());
                let opts = ScanOptions { max_file_size, threads: parse_threads(&threads) };
                let mut out = open_output(output.as_deref())?;
                let stats = allerscan_core::scan_files_and_write(&paths, &allergens, &service, &extractor, &mut out, &opts)
                    .context("scan and write failed")?;
                writeln!(out)?;
                out.flush()?;
                info!(
                    files_scanned = stats.files_scanned,
                    files_failed = stats.files_failed,
                    matches = stats.matches_total,
                    "scan finished"
                );
            }
        }
        Commands::History { limit } => {
            let recent = service.history().recent(limit)?;
            print_json(&recent)?;
        }
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            let state = AppState { service, extractor: Arc::new(CommandExtractor::new(config.extract.clone())) };
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            runtime.block_on(allerscan_server::serve(state, &listen))?;
        }
    }

    Ok(())
}

fn run_allergens(service: &ScanService, cmd: AllergenCommand) -> Result<()> {
    let store = service.store();
    match cmd {
        AllergenCommand::Add(args) => {
            let created = store.create(args.into_input()?)?;
            print_json(&Message { message: "Allergen added successfully", id: Some(&created.id) })?;
        }
        AllergenCommand::List => print_json(&store.list_all()?)?,
        AllergenCommand::Update { id, fields } => {
            store.update(&id, fields.into_input()?)?;
            print_json(&Message { message: "Allergen updated successfully", id: None })?;
        }
        AllergenCommand::Delete { id } => {
            store.delete(&id)?;
            print_json(&Message { message: "Allergen deleted successfully", id: None })?;
        }
        AllergenCommand::Import { catalog } => {
            let inputs = load_catalog(&catalog).with_context(|| format!("load catalog {}", catalog.display()))?;
            let stats = import_catalog(&**store, inputs)?;
            print_json(&serde_json::json!({ "created": stats.created, "skipped": stats.skipped }))?;
        }
    }
    Ok(())
}

/// 输出目标：文件或 stdout；校验通过后才创建文件
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).context("create output file")?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer_pretty(&mut lock, value)?;
    writeln!(lock)?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写 stderr，stdout 只输出 JSON 结果
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
