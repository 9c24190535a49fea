// ==========================================
// 条码池分配引擎 - 条码导入 Trait
// ==========================================
// 职责: 定义导入接口（不包含实现）
// ==========================================

use crate::domain::pool_entry::{ImportSummary, RawPoolRow};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ==========================================
// ImportOptions - 导入参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// 导入前清空整个条码池
    pub clear_existing: bool,
    /// 每块行数（0 表示使用配置默认值）
    pub chunk_size: usize,
    /// 历史行号阈值（None 表示使用配置默认值）
    pub legacy_row_threshold: Option<i64>,
    /// 首行的 row_number（续传导入时从断点行号开始）
    pub start_row_number: i64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            clear_existing: false,
            chunk_size: 0,
            legacy_row_threshold: None,
            start_row_number: 1,
        }
    }
}

// ==========================================
// PoolImporter Trait
// ==========================================
// 用途: 条码导入主接口
// 实现者: PoolImporterImpl
#[async_trait]
pub trait PoolImporter: Send + Sync {
    /// 导入已解析的位置列行（第 i 行的 row_number = start_row_number + i）
    ///
    /// # 流程
    /// 1. clear_existing 时清空条码池
    /// 2. 按 chunk_size 分块
    /// 3. 每块: 映射 → 空码/未知类型过滤 → 块内+跨批次去重 → 评分/定状态 → 单次写入
    ///
    /// # 返回
    /// - Ok(ImportSummary): 导入统计（行级问题只计数不报错）
    /// - Err: 存储级失败（已提交的块保留）
    async fn import_rows(
        &self,
        rows: Vec<Vec<String>>,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary>;

    /// 从文件导入（.csv / .xlsx / .xls，首行为表头）
    async fn import_from_file(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary>;

    /// 批量导入多个文件（并发执行）
    ///
    /// # 说明
    /// - 每个文件独立生成 import_batch_id
    /// - 某个文件失败不影响其他文件
    /// - clear_existing 仅对首个文件生效，避免后续文件清掉前面的结果
    async fn batch_import(
        &self,
        file_paths: Vec<std::path::PathBuf>,
        options: &ImportOptions,
    ) -> Vec<Result<ImportSummary, String>>;
}

// ==========================================
// SourceRow - 带源位置的数据行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 相对首个数据行的偏移（0 起，计入被丢弃的空行）
    ///
    /// row_number = start_row_number + offset
    pub offset: i64,
    pub cells: Vec<String>,
}

impl SourceRow {
    /// 内存中的连续行（偏移即下标）
    pub fn sequential(rows: Vec<Vec<String>>) -> Vec<SourceRow> {
        rows.into_iter()
            .enumerate()
            .map(|(offset, cells)| SourceRow {
                offset: offset as i64,
                cells,
            })
            .collect()
    }
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析（阶段 0）
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件为位置列行（不含表头，丢弃全空行但保留其位置）
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>>;
}

// ==========================================
// RowMapper Trait
// ==========================================
// 用途: 位置列 → RawPoolRow（阶段 1）
// 实现者: PositionalRowMapper
pub trait RowMapper: Send + Sync {
    fn map_row(&self, cells: &[String], row_number: i64) -> RawPoolRow;
}
