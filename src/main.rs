// ==========================================
// 条码池分配引擎 - 命令行入口
// ==========================================
// 用法:
//   barcode-pool import <file> [--clear] [--chunk N] [--start N] [--threshold N]
//   barcode-pool allocate <variant_id> [type] [sku] [title]
//   barcode-pool release <variant_id> [type]
//   barcode-pool bulk <type> <variant_id>...
//   barcode-pool report [type] [min_quality]
//   barcode-pool batches [limit]
//   barcode-pool batch <import_batch_id>
//   barcode-pool config [key value]
//
// 数据库路径: BARCODE_POOL_DB_PATH 或用户数据目录
// 输出: JSON（stdout），日志走 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use barcode_pool::app::{get_default_db_path, PoolService};
use barcode_pool::domain::{AllocateRequest, BulkAssignRequest, ReleaseRequest, VariantRef};
use barcode_pool::importer::ImportOptions;
use barcode_pool::{logging, CodeType};
use serde::Serialize;
use std::path::PathBuf;

const USAGE: &str =
    "用法: barcode-pool <import|allocate|release|bulk|report|batches|batch|config> [参数...]";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_code_type(raw: Option<&String>) -> Result<CodeType> {
    match raw {
        None => Ok(CodeType::default()),
        Some(s) => CodeType::parse(s).ok_or_else(|| anyhow!("未知条码类型: {}", s)),
    }
}

fn parse_flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(idx) => {
            let raw = args
                .get(idx + 1)
                .ok_or_else(|| anyhow!("{} 缺少参数值", flag))?;
            raw.parse::<T>()
                .map(Some)
                .map_err(|e| anyhow!("{} 参数值无效 ({}): {}", flag, raw, e))
        }
    }
}

fn open_service() -> Result<PoolService> {
    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");
    PoolService::new(db_path).map_err(|e| anyhow!(e))
}

async fn cmd_import(service: &PoolService, args: &[String]) -> Result<()> {
    let file = args.first().context("import 需要文件路径")?;
    let mut options = ImportOptions {
        clear_existing: args.iter().any(|a| a == "--clear"),
        ..ImportOptions::default()
    };
    if let Some(chunk) = parse_flag_value::<usize>(args, "--chunk")? {
        options.chunk_size = chunk;
    }
    if let Some(start) = parse_flag_value::<i64>(args, "--start")? {
        options.start_row_number = start;
    }
    options.legacy_row_threshold = parse_flag_value::<i64>(args, "--threshold")?;

    let summary = service
        .import_file(&PathBuf::from(file), &options)
        .await
        .with_context(|| format!("导入失败: {}", file))?;
    print_json(&summary)
}

fn cmd_allocate(service: &PoolService, args: &[String]) -> Result<()> {
    let variant_id = args.first().context("allocate 需要 variant_id")?;
    let code_type = parse_code_type(args.get(1))?;

    let mut variant = VariantRef::new(variant_id.as_str());
    if let Some(sku) = args.get(2) {
        variant = variant.with_sku(sku.as_str());
    }
    if let Some(title) = args.get(3) {
        variant = variant.with_title(title.as_str());
    }

    let request = AllocateRequest::new(variant).with_type(code_type);
    let outcome = service.allocate(&request)?;
    print_json(&outcome)
}

fn cmd_release(service: &PoolService, args: &[String]) -> Result<()> {
    let variant_id = args.first().context("release 需要 variant_id")?;
    let code_type = parse_code_type(args.get(1))?;
    let outcome = service.release(&ReleaseRequest::new(variant_id.as_str(), code_type))?;
    print_json(&outcome)
}

fn cmd_bulk(service: &PoolService, args: &[String]) -> Result<()> {
    let code_type = parse_code_type(args.first())?;
    let variants: Vec<VariantRef> = args
        .iter()
        .skip(1)
        .map(|id| VariantRef::new(id.as_str()))
        .collect();
    if variants.is_empty() {
        bail!("bulk 需要至少一个 variant_id");
    }

    let result = service.bulk_assign(&BulkAssignRequest::new(variants, code_type))?;
    print_json(&result)
}

fn cmd_report(service: &PoolService, args: &[String]) -> Result<()> {
    let min_quality = match args.get(1) {
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("min_quality 无效: {}", raw))?,
        None => service.settings.min_quality,
    };

    match args.first() {
        Some(_) => {
            let code_type = parse_code_type(args.first())?;
            print_json(&service.report(code_type, min_quality)?)
        }
        None => print_json(&service.report_all(min_quality)?),
    }
}

fn cmd_batches(service: &PoolService, args: &[String]) -> Result<()> {
    let limit = match args.first() {
        Some(raw) => raw.parse::<i64>().context("limit 必须为整数")?,
        None => 20,
    };
    print_json(&service.list_import_batches(limit)?)
}

fn cmd_batch(service: &PoolService, args: &[String]) -> Result<()> {
    let batch_id = args.first().context("batch 需要 import_batch_id")?;
    let entries = service.list_batch_entries(batch_id)?;
    if entries.is_empty() {
        bail!("导入批次不存在: {}", batch_id);
    }
    print_json(&entries)
}

fn cmd_config(service: &PoolService, args: &[String]) -> Result<()> {
    if let (Some(key), Some(value)) = (args.first(), args.get(1)) {
        service
            .config
            .set_global_value(key, value)
            .map_err(|e| anyhow!("写入配置失败: {}", e))?;
    }
    let snapshot = service
        .config
        .get_config_snapshot()
        .map_err(|e| anyhow!("读取配置失败: {}", e))?;
    println!("{}", snapshot);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    tracing::info!(
        app = barcode_pool::APP_NAME,
        version = barcode_pool::VERSION,
        command = %command,
        "启动"
    );
    let service = open_service()?;

    match command.as_str() {
        "import" => cmd_import(&service, rest).await,
        "allocate" => cmd_allocate(&service, rest),
        "release" => cmd_release(&service, rest),
        "bulk" => cmd_bulk(&service, rest),
        "report" => cmd_report(&service, rest),
        "batches" => cmd_batches(&service, rest),
        "batch" => cmd_batch(&service, rest),
        "config" => cmd_config(&service, rest),
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}
