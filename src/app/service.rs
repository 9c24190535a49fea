// ==========================================
// 条码池分配引擎 - 应用服务
// ==========================================
// 职责: 组装共享连接、仓储、引擎与配置，供 CLI / 上层服务调用
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::config_manager::ConfigManager;
use crate::config::pool_settings::PoolSettings;
use crate::db::{ensure_schema, open_and_ensure_schema};
use crate::domain::allocation::{
    AllocateRequest, AllocationOutcome, BulkAssignRequest, BulkAssignResult, ReleaseOutcome,
    ReleaseRequest,
};
use crate::domain::pool_entry::{ImportBatchInfo, ImportSummary, PoolEntry};
use crate::domain::report::AvailabilityReport;
use crate::domain::types::CodeType;
use crate::engine::error::PoolResult;
use crate::engine::{Allocator, AvailabilityReporter, BulkAssigner, Releaser};
use crate::importer::error::ImportResult;
use crate::importer::{ImportOptions, PoolImporter, PoolImporterImpl};
use crate::repository::error::RepositoryResult;
use crate::repository::{PoolEntryRepository, VariantCodeRepository};

/// 条码池服务
///
/// 所有组件共享同一个连接；多进程并发由 SQLite 事务与条件认领保证
pub struct PoolService {
    /// 数据库路径
    pub db_path: String,

    /// 启动时加载的配置快照
    pub settings: PoolSettings,

    pub config: Arc<ConfigManager>,
    pub pool_repo: Arc<PoolEntryRepository>,
    pub importer: Arc<PoolImporterImpl>,
    pub allocator: Arc<Allocator<VariantCodeRepository>>,
    pub releaser: Arc<Releaser<VariantCodeRepository>>,
    pub bulk_assigner: Arc<BulkAssigner<VariantCodeRepository>>,
    pub reporter: Arc<AvailabilityReporter>,
}

impl PoolService {
    /// 打开（必要时创建）数据库并组装服务
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化条码池服务");

        let conn = open_and_ensure_schema(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(conn, db_path)
    }

    /// 从已有连接组装服务（会确保 schema 存在）
    pub fn from_connection(conn: Connection, db_path: String) -> Result<Self, String> {
        ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(ConfigManager::from_connection(conn.clone()));
        let settings = config
            .load_pool_settings()
            .map_err(|e| format!("加载配置失败: {}", e))?;

        let pool_repo = Arc::new(PoolEntryRepository::from_connection(conn.clone()));
        let importer = Arc::new(PoolImporterImpl::new(conn.clone(), settings.clone()));
        let allocator = Arc::new(Allocator::new(
            conn.clone(),
            VariantCodeRepository::new(),
            settings.clone(),
        ));
        let releaser = Arc::new(Releaser::new(conn.clone(), VariantCodeRepository::new()));
        let bulk_assigner = Arc::new(BulkAssigner::new(allocator.clone()));
        let reporter = Arc::new(AvailabilityReporter::new(
            PoolEntryRepository::from_connection(conn),
            settings.clone(),
        ));

        tracing::info!(
            legacy_row_threshold = settings.legacy_row_threshold,
            min_quality = settings.min_quality,
            max_claim_attempts = settings.max_claim_attempts,
            "条码池服务初始化完成"
        );

        Ok(Self {
            db_path,
            settings,
            config,
            pool_repo,
            importer,
            allocator,
            releaser,
            bulk_assigner,
            reporter,
        })
    }

    // ==========================================
    // 导入
    // ==========================================

    pub async fn import_file(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary> {
        self.importer.import_from_file(file_path, options).await
    }

    pub async fn import_rows(
        &self,
        rows: Vec<Vec<String>>,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary> {
        self.importer.import_rows(rows, options).await
    }

    pub fn list_import_batches(&self, limit: i64) -> RepositoryResult<Vec<ImportBatchInfo>> {
        self.pool_repo.list_import_batches(limit)
    }

    /// 某导入批次的全部条目（按导入位置排序）
    pub fn list_batch_entries(&self, import_batch_id: &str) -> RepositoryResult<Vec<PoolEntry>> {
        self.pool_repo.find_by_batch(import_batch_id)
    }

    // ==========================================
    // 分配 / 释放
    // ==========================================

    pub fn allocate(&self, request: &AllocateRequest) -> PoolResult<AllocationOutcome> {
        self.allocator.allocate(request)
    }

    pub fn release(&self, request: &ReleaseRequest) -> PoolResult<ReleaseOutcome> {
        self.releaser.release(request)
    }

    pub fn bulk_assign(&self, request: &BulkAssignRequest) -> PoolResult<BulkAssignResult> {
        self.bulk_assigner.assign(request)
    }

    // ==========================================
    // 报表
    // ==========================================

    pub fn report(&self, code_type: CodeType, min_quality: i32) -> PoolResult<AvailabilityReport> {
        self.reporter.report(code_type, min_quality)
    }

    pub fn report_all(&self, min_quality: i32) -> PoolResult<Vec<AvailabilityReport>> {
        self.reporter.report_all(min_quality)
    }
}

/// 默认数据库路径
///
/// 优先级: BARCODE_POOL_DB_PATH > 用户数据目录/barcode-pool/barcode_pool.db > ./barcode_pool.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("BARCODE_POOL_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./barcode_pool.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("barcode-pool");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("barcode_pool.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::VariantRef;

    #[tokio::test]
    async fn test_service_end_to_end_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        let service = PoolService::from_connection(conn, ":memory:".to_string()).unwrap();

        let rows = vec![vec![
            "4006381333931".to_string(),
            "EAN13".to_string(),
            String::new(),
            "OLD-1".to_string(),
            "ok".to_string(),
            "Widget".to_string(),
            "Acme".to_string(),
        ]];
        let options = ImportOptions {
            start_row_number: 50_000,
            ..ImportOptions::default()
        };
        let summary = service.import_rows(rows, &options).await.unwrap();
        assert_eq!(summary.available_count, 1);

        let outcome = service
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();
        assert!(outcome.assigned);

        let report = service.report(CodeType::Ean13, 7).unwrap();
        assert_eq!(report.assigned_total, 1);
        assert_eq!(report.ready_for_assignment, 0);
        assert!(report.critical_supply);

        let released = service
            .release(&ReleaseRequest::new("v-1", CodeType::Ean13))
            .unwrap();
        assert!(released.released);

        assert_eq!(service.list_import_batches(10).unwrap().len(), 1);
    }
}
