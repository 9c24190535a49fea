// ==========================================
// 条码池分配引擎 - 导入层
// ==========================================
// 职责: 历史条码文件/行 → 评分定状态 → 条码池
// 支持: Excel, CSV, 已解析的位置列行
// ==========================================

pub mod error;
pub mod file_parser;
pub mod pool_importer;
pub mod pool_importer_trait;
pub mod quality;
pub mod row_mapper;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use pool_importer::{new_import_batch_id, PoolImporterImpl};
pub use quality::QualityScorer;
pub use row_mapper::PositionalRowMapper;

// 重导出 Trait 接口
pub use pool_importer_trait::{FileParser, ImportOptions, PoolImporter, RowMapper, SourceRow};
