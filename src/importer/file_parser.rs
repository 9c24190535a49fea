// ==========================================
// 条码池分配引擎 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 按位置列组织的原始行
// - 全空行丢弃，但其余行的 offset 仍按源文件位置计算
// - CSV 按字节读取，非 UTF-8 字节替换为 U+FFFD，不使整个文件失败
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::pool_importer_trait::{FileParser, SourceRow};
use calamine::{open_workbook_auto, Reader};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::path::Path;

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_lower(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.is_empty())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser {
    /// 首行为表头（默认 true）
    pub has_headers: bool,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self { has_headers: true }
    }
}

impl FileParser for CsvParser {
    /// offset 取记录起始行号相对首个数据行的差值（csv 读取器自身会跳过空行）
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>> {
        ensure_exists(file_path)?;

        let ext = extension_lower(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        // 表头自行处理，以便拿到表头所在行号
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 历史文件经常缺尾列
            .from_reader(file);

        let mut record = ByteRecord::new();
        let mut rows = Vec::new();
        let mut first_data_line: Option<u64> = if self.has_headers { None } else { Some(1) };
        let mut next_line = 1u64;

        while reader.read_byte_record(&mut record)? {
            let line = record.position().map_or(next_line, |p| p.line());
            next_line = line + 1;

            let Some(first_line) = first_data_line else {
                first_data_line = Some(line + 1);
                continue;
            };

            let cells: Vec<String> = record
                .iter()
                .map(|v| String::from_utf8_lossy(v).trim().to_string())
                .collect();
            if is_blank(&cells) {
                continue;
            }

            rows.push(SourceRow {
                offset: line.saturating_sub(first_line) as i64,
                cells,
            });
        }

        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    /// 首行为表头（默认 true）
    pub has_headers: bool,
}

impl Default for ExcelParser {
    fn default() -> Self {
        Self { has_headers: true }
    }
}

impl FileParser for ExcelParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>> {
        ensure_exists(file_path)?;

        let ext = extension_lower(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 只读第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let skip = usize::from(self.has_headers);
        let rows = range
            .rows()
            .skip(skip)
            .enumerate()
            .filter_map(|(offset, row)| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect();
                (!is_blank(&cells)).then(|| SourceRow {
                    offset: offset as i64,
                    cells,
                })
            })
            .collect();

        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Default)]
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>> {
        match extension_lower(file_path).as_str() {
            "csv" => CsvParser::default().parse_rows(file_path),
            "xlsx" | "xls" => ExcelParser::default().parse_rows(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
