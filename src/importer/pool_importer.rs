// ==========================================
// 条码池分配引擎 - 条码导入器实现
// ==========================================
// 流程: 解析 → 位置列映射 → 过滤/去重 → 评分/定状态 → 分块落库
// 原子性: 每块一个事务（IMMEDIATE），块提交后即持久化；
//         中途失败时已提交的块保留，可用 start_row_number 从断点续传
// ==========================================

use crate::config::pool_settings::PoolSettings;
use crate::domain::pool_entry::{ImportSummary, NewPoolEntry, RawPoolRow};
use crate::domain::types::{CodeType, PoolStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::pool_importer_trait::{
    FileParser, ImportOptions, PoolImporter, RowMapper, SourceRow,
};
use crate::importer::quality::QualityScorer;
use crate::importer::row_mapper::PositionalRowMapper;
use crate::perf::PerfGuard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::pool_entry_repo::PoolEntryRepository;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 生成导入批次号（时间戳 + 短 uuid，保证同一毫秒内也不重复）
pub fn new_import_batch_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "IMP{}_{}",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        &suffix[..8]
    )
}

// ==========================================
// PoolImporterImpl
// ==========================================
pub struct PoolImporterImpl {
    conn: Arc<Mutex<Connection>>,
    settings: PoolSettings,

    file_parser: Box<dyn FileParser>,
    row_mapper: Box<dyn RowMapper>,
}

/// 单块内待写入的行（已通过空码/类型/块内去重过滤）
struct ChunkCandidate {
    raw: RawPoolRow,
    code_type: CodeType,
}

impl PoolImporterImpl {
    /// 使用默认解析器（按扩展名）与位置列映射器
    pub fn new(conn: Arc<Mutex<Connection>>, settings: PoolSettings) -> Self {
        Self::with_components(
            conn,
            settings,
            Box::new(UniversalFileParser),
            Box::new(PositionalRowMapper),
        )
    }

    pub fn with_components(
        conn: Arc<Mutex<Connection>>,
        settings: PoolSettings,
        file_parser: Box<dyn FileParser>,
        row_mapper: Box<dyn RowMapper>,
    ) -> Self {
        Self {
            conn,
            settings,
            file_parser,
            row_mapper,
        }
    }

    fn get_conn(&self) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    fn resolve_options(&self, options: &ImportOptions) -> ImportResult<(usize, i64)> {
        let chunk_size = if options.chunk_size == 0 {
            self.settings.import_chunk_size
        } else {
            options.chunk_size
        };
        let threshold = options
            .legacy_row_threshold
            .unwrap_or(self.settings.legacy_row_threshold);

        if options.start_row_number < 1 {
            return Err(ImportError::InvalidOptions(format!(
                "start_row_number 必须 ≥ 1: {}",
                options.start_row_number
            )));
        }
        if threshold < 0 {
            return Err(ImportError::InvalidOptions(format!(
                "legacy_row_threshold 不能为负: {}",
                threshold
            )));
        }
        Ok((chunk_size, threshold))
    }

    /// 空类型列按 EAN13 处理；无法识别的类型返回 None
    fn resolve_code_type(type_raw: &str) -> Option<CodeType> {
        if type_raw.is_empty() {
            Some(CodeType::default())
        } else {
            CodeType::parse(type_raw)
        }
    }

    fn build_entry(
        scorer: &QualityScorer,
        candidate: ChunkCandidate,
        batch_id: &str,
    ) -> NewPoolEntry {
        let raw = candidate.raw;
        let non_empty = |v: &str| (!v.is_empty()).then(|| v.to_string());

        NewPoolEntry {
            quality_score: scorer.score(&raw),
            status: scorer.classify(&raw),
            is_legacy: scorer.is_legacy(&raw),
            legacy_notes: scorer.legacy_notes(&raw),
            code_type: candidate.code_type,
            row_number: raw.row_number,
            import_batch_id: batch_id.to_string(),
            legacy_sku: non_empty(&raw.legacy_sku),
            legacy_status: non_empty(&raw.legacy_status),
            legacy_product_name: non_empty(&raw.legacy_product_name),
            legacy_brand: non_empty(&raw.legacy_brand),
            legacy_updated: non_empty(&raw.legacy_updated),
            notes: non_empty(&raw.notes),
            code: raw.code,
        }
    }

    /// 单块写入（一个事务）
    ///
    /// # 返回
    /// - (本块构造的条目, 逐条插入标志)；已持久化的条码不在返回的条目中
    fn write_chunk(
        conn: &mut Connection,
        scorer: &QualityScorer,
        candidates: Vec<ChunkCandidate>,
        batch_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<(Vec<NewPoolEntry>, Vec<bool>)> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let codes: Vec<String> = candidates.iter().map(|c| c.raw.code.clone()).collect();
        let existing = PoolEntryRepository::find_existing_codes_tx(&tx, &codes)?;

        let entries: Vec<NewPoolEntry> = candidates
            .into_iter()
            .filter(|c| !existing.contains(&c.raw.code))
            .map(|c| Self::build_entry(scorer, c, batch_id))
            .collect();

        let inserted = PoolEntryRepository::insert_entries_tx(&tx, &entries, now)?;
        tx.commit().map_err(RepositoryError::from)?;

        Ok((entries, inserted))
    }

    /// 导入带源位置的行: row_number = start_row_number + offset
    #[instrument(skip(self, rows, options), fields(batch_id, total_rows = rows.len()))]
    async fn import_source_rows(
        &self,
        rows: Vec<SourceRow>,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary> {
        let started = Instant::now();
        let _perf = PerfGuard::new("import_rows");

        let (chunk_size, threshold) = self.resolve_options(options)?;
        let scorer = QualityScorer::new(threshold);
        let batch_id = new_import_batch_id();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        info!(
            batch_id = %batch_id,
            total_rows = rows.len(),
            chunk_size,
            legacy_row_threshold = threshold,
            clear_existing = options.clear_existing,
            "开始导入条码池"
        );

        let mut summary = ImportSummary {
            import_batch_id: batch_id.clone(),
            total_rows: rows.len(),
            ..ImportSummary::default()
        };

        let mut conn = self.get_conn()?;

        if options.clear_existing {
            let removed = PoolEntryRepository::truncate_tx(&conn)?;
            warn!(batch_id = %batch_id, removed, "导入前已清空条码池");
        }

        // 跨块去重（同一次调用内）
        let mut seen: HashSet<String> = HashSet::new();

        for (chunk_index, chunk) in rows.chunks(chunk_size).enumerate() {
            let mut candidates = Vec::with_capacity(chunk.len());
            for source in chunk {
                let raw = self
                    .row_mapper
                    .map_row(&source.cells, options.start_row_number + source.offset);

                if raw.code.is_empty() {
                    debug!(row_number = raw.row_number, "空条码，跳过");
                    summary.skipped_count += 1;
                    continue;
                }
                if raw.code.contains(char::REPLACEMENT_CHARACTER) {
                    debug!(row_number = raw.row_number, "条码含无法解码的字节，跳过");
                    summary.skipped_count += 1;
                    continue;
                }
                let Some(code_type) = Self::resolve_code_type(&raw.type_raw) else {
                    debug!(
                        row_number = raw.row_number,
                        type_raw = %raw.type_raw,
                        "未知条码类型，跳过"
                    );
                    summary.skipped_count += 1;
                    continue;
                };
                if !seen.insert(raw.code.clone()) {
                    debug!(row_number = raw.row_number, code = %raw.code, "本次导入内重复条码，跳过");
                    summary.skipped_count += 1;
                    continue;
                }

                candidates.push(ChunkCandidate { raw, code_type });
            }

            if candidates.is_empty() {
                continue;
            }

            let candidate_count = candidates.len();
            let now = Utc::now().naive_utc();
            let (entries, inserted) =
                Self::write_chunk(&mut conn, &scorer, candidates, &batch_id, now).map_err(
                    |source| {
                        error!(
                            batch_id = %batch_id,
                            chunk_index,
                            error = %source,
                            "块写入失败，已提交的块保留"
                        );
                        ImportError::ChunkWriteError {
                            batch_id: batch_id.clone(),
                            chunk_index,
                            source,
                        }
                    },
                )?;

            // 已持久化的条码
            summary.skipped_count += candidate_count - entries.len();

            for (entry, ok) in entries.iter().zip(inserted) {
                if !ok {
                    // 并发导入抢先写入了同一条码
                    summary.skipped_count += 1;
                    continue;
                }
                summary.total_processed += 1;
                match entry.status {
                    PoolStatus::LegacyArchive => summary.legacy_count += 1,
                    PoolStatus::Problematic => summary.problematic_count += 1,
                    PoolStatus::Available => summary.available_count += 1,
                    PoolStatus::Assigned | PoolStatus::Reserved => {}
                }
            }
            summary.chunks_committed += 1;

            debug!(
                batch_id = %batch_id,
                chunk_index,
                processed = summary.total_processed,
                skipped = summary.skipped_count,
                "块已提交"
            );
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            batch_id = %batch_id,
            total_processed = summary.total_processed,
            available = summary.available_count,
            legacy = summary.legacy_count,
            problematic = summary.problematic_count,
            skipped = summary.skipped_count,
            chunks = summary.chunks_committed,
            elapsed_ms = summary.elapsed_ms,
            "条码池导入完成"
        );

        Ok(summary)
    }
}

#[async_trait]
impl PoolImporter for PoolImporterImpl {
    async fn import_rows(
        &self,
        rows: Vec<Vec<String>>,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary> {
        self.import_source_rows(SourceRow::sequential(rows), options)
            .await
    }

    #[instrument(skip(self, options), fields(file = %file_path.display()))]
    async fn import_from_file(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportResult<ImportSummary> {
        let rows = self.file_parser.parse_rows(file_path).map_err(|e| {
            error!(file = %file_path.display(), error = %e, "文件解析失败");
            e
        })?;
        info!(file = %file_path.display(), rows = rows.len(), "文件解析完成");

        self.import_source_rows(rows, options).await
    }

    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        options: &ImportOptions,
    ) -> Vec<Result<ImportSummary, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let tasks = file_paths.into_iter().enumerate().map(|(idx, path)| {
            let mut file_options = options.clone();
            if idx > 0 {
                file_options.clear_existing = false;
            }
            async move {
                let path_str = path.display().to_string();
                match self.import_from_file(&path, &file_options).await {
                    Ok(summary) => {
                        info!(
                            file = %path_str,
                            batch_id = %summary.import_batch_id,
                            processed = summary.total_processed,
                            "文件导入成功"
                        );
                        Ok(summary)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}
