// ==========================================
// 条码池分配引擎 - 分配器
// ==========================================
// 流程（每次尝试一个 IMMEDIATE 事务）:
// 1. 幂等检查: 变体已持有该类型条码 → assigned=false，不改池
// 2. 选取候选: available ∧ type ∧ quality ≥ min，row_number ASC, id ASC
// 3. 无候选 → PoolExhausted
// 4. 条件认领: UPDATE ... WHERE id=? AND status='available'
//    影响 0 行 → ConcurrencyConflict（可重试）
// 5. 写变体侧记录，与认领同事务提交
// ==========================================
// 冲突策略: 可重试错误（认领冲突 / 数据库繁忙）时重新开启事务并重试，
//           最多 max_claim_attempts 次，仍失败则把错误交给调用方
// 最低质量分: 请求未指定时取配置 pool/min_quality
// ==========================================

use crate::config::pool_settings::PoolSettings;
use crate::domain::allocation::{AllocateRequest, AllocationOutcome, VariantRef};
use crate::domain::pool_entry::PoolEntry;
use crate::domain::types::CodeType;
use crate::engine::error::{PoolError, PoolResult};
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::pool_entry_repo::PoolEntryRepository;
use crate::repository::variant_code_store::VariantCodeStore;
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// 质量分合法范围
pub(crate) fn validate_min_quality(min_quality: i32) -> PoolResult<()> {
    if !(1..=10).contains(&min_quality) {
        return Err(PoolError::Validation(format!(
            "min_quality 超出范围 [1,10]: {}",
            min_quality
        )));
    }
    Ok(())
}

pub(crate) fn validate_variant_id(variant_id: &str) -> PoolResult<()> {
    if variant_id.trim().is_empty() {
        return Err(PoolError::Validation("variant_id 不能为空".to_string()));
    }
    Ok(())
}

// ==========================================
// Allocator - 分配器
// ==========================================
pub struct Allocator<S: VariantCodeStore> {
    conn: Arc<Mutex<Connection>>,
    store: S,
    settings: PoolSettings,
}

impl<S: VariantCodeStore> Allocator<S> {
    pub fn new(conn: Arc<Mutex<Connection>>, store: S, settings: PoolSettings) -> Self {
        Self {
            conn,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// 请求未指定最低质量分时使用配置值
    pub fn resolve_min_quality(&self, requested: Option<i32>) -> i32 {
        requested.unwrap_or(self.settings.min_quality)
    }

    fn get_conn(&self) -> PoolResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PoolError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 为变体分配一个条码
    ///
    /// # 返回
    /// - Ok(assigned=true): 新认领的条目
    /// - Ok(assigned=false): 变体已持有该类型条码（幂等）
    /// - Err(PoolExhausted): 无满足条件的候选
    /// - Err(ConcurrencyConflict): 重试次数用尽仍冲突
    #[instrument(
        skip(self, request),
        fields(
            variant_id = %request.variant.variant_id,
            code_type = %request.code_type,
            min_quality = tracing::field::Empty
        )
    )]
    pub fn allocate(&self, request: &AllocateRequest) -> PoolResult<AllocationOutcome> {
        validate_variant_id(&request.variant.variant_id)?;
        let min_quality = self.resolve_min_quality(request.min_quality);
        validate_min_quality(min_quality)?;
        tracing::Span::current().record("min_quality", min_quality);

        let _perf = PerfGuard::new("allocate");
        let max_attempts = self.settings.max_claim_attempts.max(1);
        let mut conn = self.get_conn()?;

        let mut attempt = 1;
        loop {
            match self.try_allocate(&mut conn, request, min_quality) {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "分配尝试失败，重新选取候选");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// 单次分配尝试（一个事务）
    fn try_allocate(
        &self,
        conn: &mut Connection,
        request: &AllocateRequest,
        min_quality: i32,
    ) -> PoolResult<AllocationOutcome> {
        let variant_id = request.variant.variant_id.as_str();
        let code_type = request.code_type;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // 1. 幂等检查
        if let Some(existing) = self.find_existing(&tx, variant_id, code_type)? {
            tx.commit()?;
            debug!(code = %existing.code, "变体已持有条码，跳过分配");
            return Ok(existing);
        }

        // 2. 选取候选
        let candidate =
            PoolEntryRepository::find_next_candidate_tx(&tx, code_type, min_quality)?
                .ok_or(PoolError::PoolExhausted {
                    code_type,
                    min_quality,
                })?;

        // 3. 条件认领
        let entry = self.claim_candidate(&tx, &request.variant, code_type, &candidate)?;
        tx.commit()?;

        info!(
            variant_id,
            code_type = %code_type,
            code = %entry.code,
            quality_score = entry.quality_score,
            row_number = entry.row_number,
            "条码分配成功"
        );

        Ok(AllocationOutcome {
            assigned: true,
            code: entry.code.clone(),
            code_type,
            entry: Some(entry),
        })
    }

    /// 幂等检查
    ///
    /// 以变体侧记录为准；变体侧记录缺失但池中已有分配给该变体的条目时，
    /// 补写变体侧记录并按已持有处理
    fn find_existing(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> PoolResult<Option<AllocationOutcome>> {
        if let Some(record) = self.store.find_code(conn, variant_id, code_type)? {
            let entry = PoolEntryRepository::find_assigned_tx(conn, &record.code, variant_id)?;
            if entry.is_none() {
                warn!(variant_id, code = %record.code, "变体侧记录在条码池中无对应条目");
            }
            return Ok(Some(AllocationOutcome {
                assigned: false,
                code: record.code,
                code_type,
                entry,
            }));
        }

        if let Some(entry) =
            PoolEntryRepository::find_by_variant_and_type_tx(conn, variant_id, code_type)?
        {
            let attached_at = entry.assigned_at.unwrap_or_else(|| Utc::now().naive_utc());
            self.store
                .attach_code(conn, variant_id, code_type, &entry.code, attached_at)?;
            warn!(variant_id, code = %entry.code, "变体侧记录缺失，已按池中分配补写");
            return Ok(Some(AllocationOutcome {
                assigned: false,
                code: entry.code.clone(),
                code_type,
                entry: Some(entry),
            }));
        }

        Ok(None)
    }

    /// 认领已选中的候选（调用方负责事务）
    ///
    /// 候选在选取之后被其他进程认领时返回 ConcurrencyConflict，
    /// 此时事务内尚未写入任何变更
    pub fn claim_candidate(
        &self,
        conn: &Connection,
        variant: &VariantRef,
        code_type: CodeType,
        candidate: &PoolEntry,
    ) -> PoolResult<PoolEntry> {
        let now = Utc::now().naive_utc();

        if !PoolEntryRepository::claim_tx(conn, candidate.id, variant, now)? {
            return Err(PoolError::ConcurrencyConflict {
                entry_id: candidate.id,
                code: candidate.code.clone(),
                variant_id: variant.variant_id.clone(),
            });
        }

        self.store
            .attach_code(conn, &variant.variant_id, code_type, &candidate.code, now)?;

        PoolEntryRepository::find_by_id_tx(conn, candidate.id)?.ok_or_else(|| {
            PoolError::Repository(RepositoryError::NotFound {
                entity: "pool_entry".to_string(),
                id: candidate.id.to_string(),
            })
        })
    }

    /// 预览下一个将被分配的条目（不认领）
    pub fn preview_next(
        &self,
        code_type: CodeType,
        min_quality: i32,
    ) -> PoolResult<Option<PoolEntry>> {
        validate_min_quality(min_quality)?;
        let conn = self.get_conn()?;
        Ok(PoolEntryRepository::find_next_candidate_tx(
            &conn,
            code_type,
            min_quality,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pool_entry::NewPoolEntry;
    use crate::domain::types::PoolStatus;
    use crate::domain::allocation::VariantCode;
    use crate::repository::error::RepositoryResult;
    use crate::repository::variant_code_repo::VariantCodeRepository;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 前 busy_left 次查询返回数据库繁忙，之后委托给 variant_code 表
    struct BusyStore {
        inner: VariantCodeRepository,
        busy_left: AtomicUsize,
        lookups: AtomicUsize,
    }

    impl BusyStore {
        fn new(busy_left: usize) -> Self {
            Self {
                inner: VariantCodeRepository::new(),
                busy_left: AtomicUsize::new(busy_left),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    impl VariantCodeStore for BusyStore {
        fn find_code(
            &self,
            conn: &Connection,
            variant_id: &str,
            code_type: CodeType,
        ) -> RepositoryResult<Option<VariantCode>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let left = self.busy_left.load(Ordering::SeqCst);
            if left > 0 {
                self.busy_left.store(left - 1, Ordering::SeqCst);
                return Err(RepositoryError::DatabaseBusy("database is locked".to_string()));
            }
            self.inner.find_code(conn, variant_id, code_type)
        }

        fn attach_code(
            &self,
            conn: &Connection,
            variant_id: &str,
            code_type: CodeType,
            code: &str,
            attached_at: NaiveDateTime,
        ) -> RepositoryResult<()> {
            self.inner
                .attach_code(conn, variant_id, code_type, code, attached_at)
        }

        fn detach_code(
            &self,
            conn: &Connection,
            variant_id: &str,
            code_type: CodeType,
        ) -> RepositoryResult<bool> {
            self.inner.detach_code(conn, variant_id, code_type)
        }
    }

    fn setup(codes: &[(&str, i64, i32)]) -> (Arc<Mutex<Connection>>, Allocator<VariantCodeRepository>) {
        let conn = Arc::new(Mutex::new(seeded_conn(codes)));
        let allocator = Allocator::new(conn.clone(), VariantCodeRepository::new(), PoolSettings::default());
        (conn, allocator)
    }

    fn seeded_conn(codes: &[(&str, i64, i32)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();

        let entries: Vec<NewPoolEntry> = codes
            .iter()
            .map(|(code, row_number, quality)| NewPoolEntry {
                code: code.to_string(),
                code_type: CodeType::Ean13,
                status: PoolStatus::Available,
                quality_score: *quality,
                is_legacy: false,
                row_number: *row_number,
                import_batch_id: "batch-1".to_string(),
                legacy_sku: None,
                legacy_status: None,
                legacy_product_name: None,
                legacy_brand: None,
                legacy_updated: None,
                legacy_notes: None,
                notes: None,
            })
            .collect();
        PoolEntryRepository::insert_entries_tx(&conn, &entries, Utc::now().naive_utc()).unwrap();
        conn
    }

    #[test]
    fn test_allocate_picks_lowest_row_number() {
        let (_conn, allocator) = setup(&[("C-2", 50_002, 9), ("C-1", 50_001, 8), ("C-0", 50_000, 6)]);

        let request = AllocateRequest::new(VariantRef::new("v-1").with_sku("SKU-1"));
        let outcome = allocator.allocate(&request).unwrap();

        assert!(outcome.assigned);
        assert_eq!(outcome.code, "C-1");
        let entry = outcome.entry.unwrap();
        assert_eq!(entry.status, PoolStatus::Assigned);
        assert_eq!(entry.assigned_variant_id.as_deref(), Some("v-1"));
        assert_eq!(entry.sku.as_deref(), Some("SKU-1"));
        assert!(entry.assigned_at.is_some());
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let (_conn, allocator) = setup(&[("C-1", 50_001, 8), ("C-2", 50_002, 8)]);
        let request = AllocateRequest::new(VariantRef::new("v-1"));

        let first = allocator.allocate(&request).unwrap();
        let second = allocator.allocate(&request).unwrap();

        assert!(first.assigned);
        assert!(!second.assigned);
        assert_eq!(first.code, second.code);
        assert_eq!(allocator.preview_next(CodeType::Ean13, 7).unwrap().unwrap().code, "C-2");
    }

    #[test]
    fn test_exhausted_pool() {
        let (_conn, allocator) = setup(&[("C-1", 50_001, 5)]);
        let err = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::PoolExhausted { code_type: CodeType::Ean13, min_quality: 7 }
        ));

        // 降低质量要求后可分配
        let outcome = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")).with_min_quality(5))
            .unwrap();
        assert_eq!(outcome.code, "C-1");
    }

    #[test]
    fn test_stale_candidate_reports_conflict() {
        let (conn, allocator) = setup(&[("C-1", 50_001, 8)]);
        let stale = allocator.preview_next(CodeType::Ean13, 7).unwrap().unwrap();

        allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();

        let guard = conn.lock().unwrap();
        let err = allocator
            .claim_candidate(&guard, &VariantRef::new("v-2"), CodeType::Ean13, &stale)
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, PoolError::ConcurrencyConflict { entry_id, .. } if entry_id == stale.id));
    }

    #[test]
    fn test_validation_errors() {
        let (_conn, allocator) = setup(&[]);
        assert!(matches!(
            allocator.allocate(&AllocateRequest::new(VariantRef::new("  "))),
            Err(PoolError::Validation(_))
        ));
        assert!(matches!(
            allocator.allocate(&AllocateRequest::new(VariantRef::new("v-1")).with_min_quality(11)),
            Err(PoolError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_variant_record_is_restored() {
        let (conn, allocator) = setup(&[("C-1", 50_001, 8), ("C-2", 50_002, 8)]);
        allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();

        {
            let guard = conn.lock().unwrap();
            guard
                .execute("DELETE FROM variant_code WHERE variant_id = 'v-1'", [])
                .unwrap();
        }

        let outcome = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();
        assert!(!outcome.assigned);
        assert_eq!(outcome.code, "C-1");

        let guard = conn.lock().unwrap();
        let record = VariantCodeRepository::new()
            .find_code(&guard, "v-1", CodeType::Ean13)
            .unwrap();
        assert_eq!(record.map(|r| r.code).as_deref(), Some("C-1"));
    }

    #[test]
    fn test_busy_attempt_is_retried() {
        let store = BusyStore::new(1);
        let allocator = Allocator::new(
            Arc::new(Mutex::new(seeded_conn(&[("C-1", 50_001, 8)]))),
            store,
            PoolSettings::default(),
        );

        let outcome = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();

        assert!(outcome.assigned);
        assert_eq!(outcome.code, "C-1");
        assert_eq!(allocator.store.lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_persistent_busy_stops_after_max_attempts() {
        let allocator = Allocator::new(
            Arc::new(Mutex::new(seeded_conn(&[("C-1", 50_001, 8)]))),
            BusyStore::new(usize::MAX),
            PoolSettings::default(),
        );

        let err = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap_err();

        assert!(matches!(err, PoolError::Repository(RepositoryError::DatabaseBusy(_))));
        assert_eq!(
            allocator.store.lookups.load(Ordering::SeqCst),
            PoolSettings::default().max_claim_attempts as usize
        );
        assert_eq!(allocator.preview_next(CodeType::Ean13, 7).unwrap().unwrap().code, "C-1");
    }

    #[test]
    fn test_repeated_claim_conflict_surfaces_after_retries() {
        let (conn, allocator) = setup(&[("C-1", 50_001, 8)]);
        {
            // 认领 UPDATE 被静默忽略，模拟候选每次都被其他进程抢先
            let guard = conn.lock().unwrap();
            guard
                .execute_batch(
                    "CREATE TRIGGER steal_claim BEFORE UPDATE OF status ON pool_entry
                     WHEN NEW.status = 'assigned'
                     BEGIN SELECT RAISE(IGNORE); END;",
                )
                .unwrap();
        }

        let err = allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap_err();
        assert!(matches!(err, PoolError::ConcurrencyConflict { ref code, .. } if code == "C-1"));

        let guard = conn.lock().unwrap();
        let entry = PoolEntryRepository::find_by_code_tx(&guard, "C-1").unwrap().unwrap();
        assert_eq!(entry.status, PoolStatus::Available);
        assert!(VariantCodeRepository::new()
            .find_code(&guard, "v-1", CodeType::Ean13)
            .unwrap()
            .is_none());
    }
}
