// ==========================================
// 薪资导入对账系统 - 命令行入口
// ==========================================
// 子命令:
// - import         导入表格到导入表（新建或追加）
// - apply          将导入表应用到工资单
// - show           查看导入表及明细
// - list           按期间列出导入表
// - seed-sequence  定义引用号序列
// 输出: stdout 为 JSON，日志走 stderr
// ==========================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use payroll_import::config::config_manager::defaults;
use payroll_import::{logging, ImportUpload, NewSheet, PayrollImportApi, SheetTarget};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "payroll-import")]
#[command(version, about = "Import payroll adjustment spreadsheets and reconcile them into payslips.")]
struct Cli {
    /// SQLite database path (defaults to $PAYROLL_IMPORT_DB_PATH or the user data directory).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a spreadsheet into an import sheet.
    Import(ImportArgs),
    /// Apply an import sheet to payslips.
    Apply(SheetArgs),
    /// Show an import sheet and its lines.
    Show(SheetArgs),
    /// List import sheets for a pay period.
    List(PeriodArgs),
    /// Define (or reset) the reference sequence.
    SeedSequence(SeedSequenceArgs),
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Spreadsheet file (.xlsx/.xlsm/.xls/.ods/.csv).
    #[arg(long)]
    file: PathBuf,

    /// Existing import sheet id; when omitted a new sheet is created.
    #[arg(long, conflicts_with_all = ["month", "year", "name"])]
    sheet: Option<String>,

    /// Pay period month (1-12) for a new sheet.
    #[arg(long, required_unless_present = "sheet")]
    month: Option<u32>,

    /// Pay period year for a new sheet.
    #[arg(long, required_unless_present = "sheet")]
    year: Option<i32>,

    /// Explicit reference for a new sheet (otherwise generated from the sequence).
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct SheetArgs {
    /// Import sheet id.
    #[arg(long)]
    sheet: String,
}

#[derive(Debug, Args)]
struct PeriodArgs {
    #[arg(long)]
    month: u32,

    #[arg(long)]
    year: i32,
}

#[derive(Debug, Args)]
struct SeedSequenceArgs {
    #[arg(long, default_value = defaults::REFERENCE_SEQUENCE_CODE)]
    code: String,

    /// Next number to hand out.
    #[arg(long, default_value_t = 1)]
    next: i64,

    /// Zero-padding width.
    #[arg(long, default_value_t = 3)]
    padding: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    tracing::info!(version = payroll_import::VERSION, db = %db_path.display(), "{}", payroll_import::APP_NAME);

    let db_path_str = db_path
        .to_str()
        .context("database path is not valid UTF-8")?;
    let api = PayrollImportApi::new(db_path_str)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let output = match cli.command {
        Command::Import(args) => run_import(&api, args)?,
        Command::Apply(args) => json!(api.apply_to_payslips(&args.sheet)?),
        Command::Show(args) => json!({
            "sheet": api.get_sheet(&args.sheet)?,
            "lines": api.list_lines(&args.sheet)?,
        }),
        Command::List(args) => json!(api.list_sheets(args.month, args.year)?),
        Command::SeedSequence(args) => {
            api.define_sequence(&args.code, args.next, args.padding)?;
            json!({ "code": args.code, "next": args.next, "padding": args.padding })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_import(api: &PayrollImportApi, args: ImportArgs) -> Result<serde_json::Value> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let upload = ImportUpload::new(file_name_of(&args.file), content);

    let target = match args.sheet {
        Some(sheet_id) => SheetTarget::Existing(sheet_id),
        None => SheetTarget::New(NewSheet {
            name: args.name,
            month: args.month.context("--month is required for a new sheet")?,
            year: args.year.context("--year is required for a new sheet")?,
        }),
    };

    let summary = api.import_file(&target, &upload)?;
    let notification = summary.notification();
    Ok(json!({ "summary": summary, "notification": notification }))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 默认数据库路径
///
/// 优先级: 环境变量 PAYROLL_IMPORT_DB_PATH > 用户数据目录 > 当前目录
fn default_db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PAYROLL_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("payroll-import");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            Ok(dir.join("payroll_import.db"))
        }
        None => Ok(PathBuf::from("./payroll_import.db")),
    }
}
