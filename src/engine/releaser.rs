// ==========================================
// 条码池分配引擎 - 释放器
// ==========================================
// 流程（一个 IMMEDIATE 事务）:
// 1. 查变体侧记录；无记录 → released=false
// 2. 找到分配给该变体的池条目 → 恢复 available，清空分配信息与冗余 sku/title
// 3. 池条目缺失（孤立记录）→ 删除变体侧记录，released=true + orphaned=true
// 4. 池条目变更与变体侧记录删除同事务提交
// 条件更新影响 0 行 → ConcurrencyConflict，事务回滚，变体侧记录保留
// ==========================================

use crate::domain::allocation::{ReleaseOutcome, ReleaseRequest};
use crate::engine::allocator::validate_variant_id;
use crate::engine::error::{PoolError, PoolResult};
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::pool_entry_repo::PoolEntryRepository;
use crate::repository::variant_code_store::VariantCodeStore;
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const NOTE_NOTHING_TO_RELEASE: &str = "变体未持有该类型条码";

pub struct Releaser<S: VariantCodeStore> {
    conn: Arc<Mutex<Connection>>,
    store: S,
}

impl<S: VariantCodeStore> Releaser<S> {
    pub fn new(conn: Arc<Mutex<Connection>>, store: S) -> Self {
        Self { conn, store }
    }

    fn get_conn(&self) -> PoolResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PoolError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 释放变体持有的某类型条码
    #[instrument(
        skip(self, request),
        fields(variant_id = %request.variant_id, code_type = %request.code_type)
    )]
    pub fn release(&self, request: &ReleaseRequest) -> PoolResult<ReleaseOutcome> {
        validate_variant_id(&request.variant_id)?;

        let _perf = PerfGuard::new("release");
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(record) = self
            .store
            .find_code(&tx, &request.variant_id, request.code_type)?
        else {
            debug!("无可释放的条码");
            return Ok(ReleaseOutcome {
                released: false,
                code: None,
                orphaned: false,
                note: Some(NOTE_NOTHING_TO_RELEASE.to_string()),
            });
        };

        let now = Utc::now().naive_utc();
        let entry = PoolEntryRepository::find_assigned_tx(&tx, &record.code, &request.variant_id)?;

        let outcome = match entry {
            Some(entry) => {
                if !PoolEntryRepository::release_tx(&tx, entry.id, now)? {
                    return Err(PoolError::ConcurrencyConflict {
                        entry_id: entry.id,
                        code: entry.code,
                        variant_id: request.variant_id.clone(),
                    });
                }
                self.store
                    .detach_code(&tx, &request.variant_id, request.code_type)?;
                info!(code = %entry.code, entry_id = entry.id, "条码已释放回池");
                ReleaseOutcome {
                    released: true,
                    code: Some(entry.code),
                    orphaned: false,
                    note: None,
                }
            }
            None => {
                let orphan = PoolError::OrphanedRecord {
                    variant_id: request.variant_id.clone(),
                    code_type: request.code_type,
                    code: record.code.clone(),
                };
                self.store
                    .detach_code(&tx, &request.variant_id, request.code_type)?;
                warn!(error = %orphan, "孤立记录已删除");
                ReleaseOutcome {
                    released: true,
                    code: Some(record.code),
                    orphaned: true,
                    note: Some(orphan.to_string()),
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::pool_settings::PoolSettings;
    use crate::domain::allocation::{AllocateRequest, VariantRef};
    use crate::domain::pool_entry::NewPoolEntry;
    use crate::domain::types::{CodeType, PoolStatus};
    use crate::engine::allocator::Allocator;
    use crate::repository::variant_code_repo::VariantCodeRepository;

    fn setup() -> (
        Arc<Mutex<Connection>>,
        Allocator<VariantCodeRepository>,
        Releaser<VariantCodeRepository>,
    ) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        PoolEntryRepository::insert_entries_tx(
            &conn,
            &[NewPoolEntry {
                code: "4006381333931".to_string(),
                code_type: CodeType::Ean13,
                status: PoolStatus::Available,
                quality_score: 9,
                is_legacy: false,
                row_number: 50_001,
                import_batch_id: "batch-1".to_string(),
                legacy_sku: Some("OLD-1".to_string()),
                legacy_status: Some("ok".to_string()),
                legacy_product_name: Some("Widget".to_string()),
                legacy_brand: None,
                legacy_updated: None,
                legacy_notes: Some("Legacy SKU: OLD-1 | Product: Widget".to_string()),
                notes: None,
            }],
            Utc::now().naive_utc(),
        )
        .unwrap();

        let conn = Arc::new(Mutex::new(conn));
        let allocator = Allocator::new(
            conn.clone(),
            VariantCodeRepository::new(),
            PoolSettings::default(),
        );
        let releaser = Releaser::new(conn.clone(), VariantCodeRepository::new());
        (conn, allocator, releaser)
    }

    #[test]
    fn test_release_restores_entry() {
        let (conn, allocator, releaser) = setup();
        let before = allocator.preview_next(CodeType::Ean13, 7).unwrap().unwrap();

        allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1").with_title("Blue")))
            .unwrap();
        let outcome = releaser
            .release(&ReleaseRequest::new("v-1", CodeType::Ean13))
            .unwrap();

        assert!(outcome.released);
        assert!(!outcome.orphaned);
        assert_eq!(outcome.code.as_deref(), Some("4006381333931"));

        let guard = conn.lock().unwrap();
        let after = PoolEntryRepository::find_by_id_tx(&guard, before.id)
            .unwrap()
            .unwrap();
        assert_eq!(after.status, PoolStatus::Available);
        assert_eq!(after.assigned_variant_id, None);
        assert_eq!(after.title, None);
        assert_eq!(after.quality_score, before.quality_score);
        assert_eq!(after.legacy_notes, before.legacy_notes);
        assert!(VariantCodeRepository::new()
            .find_code(&guard, "v-1", CodeType::Ean13)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_release_without_record() {
        let (_conn, _allocator, releaser) = setup();
        let outcome = releaser
            .release(&ReleaseRequest::new("v-9", CodeType::Ean13))
            .unwrap();
        assert!(!outcome.released);
        assert!(outcome.code.is_none());
    }

    #[test]
    fn test_orphaned_record_self_heals() {
        let (conn, _allocator, releaser) = setup();
        {
            let guard = conn.lock().unwrap();
            VariantCodeRepository::new()
                .attach_code(&guard, "v-1", CodeType::Ean13, "9999999999999", Utc::now().naive_utc())
                .unwrap();
        }

        let outcome = releaser
            .release(&ReleaseRequest::new("v-1", CodeType::Ean13))
            .unwrap();
        assert!(outcome.released);
        assert!(outcome.orphaned);
        assert!(outcome.note.unwrap().contains("9999999999999"));

        let guard = conn.lock().unwrap();
        assert!(VariantCodeRepository::new()
            .find_code(&guard, "v-1", CodeType::Ean13)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_lost_release_update_rolls_back() {
        let (conn, allocator, releaser) = setup();
        allocator
            .allocate(&AllocateRequest::new(VariantRef::new("v-1")))
            .unwrap();
        {
            let guard = conn.lock().unwrap();
            guard
                .execute_batch(
                    "CREATE TRIGGER hold_entry BEFORE UPDATE OF status ON pool_entry
                     WHEN NEW.status = 'available'
                     BEGIN SELECT RAISE(IGNORE); END;",
                )
                .unwrap();
        }

        let err = releaser
            .release(&ReleaseRequest::new("v-1", CodeType::Ean13))
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::ConcurrencyConflict { ref code, ref variant_id, .. }
                if code == "4006381333931" && variant_id == "v-1"
        ));

        let guard = conn.lock().unwrap();
        let entry = PoolEntryRepository::find_by_code_tx(&guard, "4006381333931")
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, PoolStatus::Assigned);
        assert_eq!(
            VariantCodeRepository::new()
                .find_code(&guard, "v-1", CodeType::Ean13)
                .unwrap()
                .map(|r| r.code)
                .as_deref(),
            Some("4006381333931")
        );
    }
}
