// ==========================================
// 条码池分配引擎 - 条码池条目仓储
// ==========================================
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================
// 约定:
// - `*_tx` 关联函数接收调用方的连接/事务（&Transaction 可自动解引用为 &Connection），
//   供引擎层把条目变更与变体侧记录变更组合在同一事务中
// - 实例方法自行加锁，仅用于只读查询
// ==========================================

use crate::domain::pool_entry::{ImportBatchInfo, NewPoolEntry, PoolEntry};
use crate::domain::report::StatusCounts;
use crate::domain::types::{CodeType, PoolStatus};
use crate::domain::allocation::VariantRef;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// 单条 IN (...) 查询的参数上限（远低于 SQLite 变量上限）
const EXISTS_QUERY_BATCH: usize = 500;

const SELECT_COLUMNS: &str = r#"
    id, code, code_type, status, quality_score, is_legacy, row_number,
    assigned_variant_id, assigned_at, import_batch_id,
    legacy_sku, legacy_status, legacy_product_name, legacy_brand, legacy_updated,
    legacy_notes, notes, sku, title, created_at, updated_at
"#;

// ==========================================
// PoolEntryRepository - 条码池条目仓储
// ==========================================
pub struct PoolEntryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PoolEntryRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在一个只读（DEFERRED）事务内执行多条查询，各查询看到同一快照
    pub fn with_read_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_row(row: &Row) -> rusqlite::Result<PoolEntry> {
        let code_type_raw: String = row.get(2)?;
        let status_raw: String = row.get(3)?;

        let code_type = CodeType::parse(&code_type_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知条码类型: {}", code_type_raw).into(),
            )
        })?;
        let status = PoolStatus::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知条目状态: {}", status_raw).into(),
            )
        })?;

        Ok(PoolEntry {
            id: row.get(0)?,
            code: row.get(1)?,
            code_type,
            status,
            quality_score: row.get(4)?,
            is_legacy: row.get::<_, i32>(5)? != 0,
            row_number: row.get(6)?,
            assigned_variant_id: row.get(7)?,
            assigned_at: row.get(8)?,
            import_batch_id: row.get(9)?,
            legacy_sku: row.get(10)?,
            legacy_status: row.get(11)?,
            legacy_product_name: row.get(12)?,
            legacy_brand: row.get(13)?,
            legacy_updated: row.get(14)?,
            legacy_notes: row.get(15)?,
            notes: row.get(16)?,
            sku: row.get(17)?,
            title: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }

    // ==========================================
    // 导入（事务内）
    // ==========================================

    /// 在一次查询（按 EXISTS_QUERY_BATCH 分段）中找出已持久化的条码
    pub fn find_existing_codes_tx(
        conn: &Connection,
        codes: &[String],
    ) -> RepositoryResult<HashSet<String>> {
        let mut existing = HashSet::new();
        for part in codes.chunks(EXISTS_QUERY_BATCH) {
            let placeholders = vec!["?"; part.len()].join(", ");
            let sql = format!(
                "SELECT code FROM pool_entry WHERE code IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(part.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            for code in rows {
                existing.insert(code?);
            }
        }
        Ok(existing)
    }

    /// 批量插入条目
    ///
    /// # 返回
    /// - 与 entries 等长的标志列表：true=已插入，false=code 已被并发导入占用
    ///
    /// # 说明
    /// - ON CONFLICT(code) DO NOTHING：唯一性冲突按跳过处理，不中断整块写入
    pub fn insert_entries_tx(
        conn: &Connection,
        entries: &[NewPoolEntry],
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<bool>> {
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO pool_entry (
                code, code_type, status, quality_score, is_legacy, row_number,
                import_batch_id, legacy_sku, legacy_status, legacy_product_name,
                legacy_brand, legacy_updated, legacy_notes, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15
            )
            ON CONFLICT(code) DO NOTHING
            "#,
        )?;

        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            let changed = stmt.execute(params![
                entry.code,
                entry.code_type.to_db_str(),
                entry.status.to_db_str(),
                entry.quality_score,
                entry.is_legacy as i32,
                entry.row_number,
                entry.import_batch_id,
                entry.legacy_sku,
                entry.legacy_status,
                entry.legacy_product_name,
                entry.legacy_brand,
                entry.legacy_updated,
                entry.legacy_notes,
                entry.notes,
                now,
            ])?;
            inserted.push(changed == 1);
        }

        Ok(inserted)
    }

    /// 清空整个条码池（导入 clear_existing 时使用）
    pub fn truncate_tx(conn: &Connection) -> RepositoryResult<usize> {
        Ok(conn.execute("DELETE FROM pool_entry", [])?)
    }

    // ==========================================
    // 分配 / 释放（事务内）
    // ==========================================

    /// 按分配优先级选取下一个候选条目
    ///
    /// 条件: status=available ∧ code_type=T ∧ quality_score ≥ min_quality
    /// 排序: row_number ASC, id ASC
    pub fn find_next_candidate_tx(
        conn: &Connection,
        code_type: CodeType,
        min_quality: i32,
    ) -> RepositoryResult<Option<PoolEntry>> {
        let sql = format!(
            r#"SELECT {} FROM pool_entry
               WHERE status = 'available' AND code_type = ?1 AND quality_score >= ?2
               ORDER BY row_number ASC, id ASC
               LIMIT 1"#,
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![code_type.to_db_str(), min_quality], Self::map_row)
            .optional()?)
    }

    /// 条件认领：仅当条目仍为 available 时置为 assigned
    ///
    /// # 返回
    /// - true: 认领成功
    /// - false: 条目已被其他进程认领（或不存在），调用方据此报告并发冲突
    pub fn claim_tx(
        conn: &Connection,
        entry_id: i64,
        variant: &VariantRef,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let changed = conn.execute(
            r#"UPDATE pool_entry
               SET status = 'assigned', assigned_variant_id = ?1, assigned_at = ?2,
                   sku = ?3, title = ?4, updated_at = ?2
               WHERE id = ?5 AND status = 'available'"#,
            params![variant.variant_id, now, variant.sku, variant.title, entry_id],
        )?;
        Ok(changed == 1)
    }

    /// 释放条目：恢复 available，清空分配信息与冗余的 sku/title
    ///
    /// 质量分与历史元数据保持不变
    pub fn release_tx(
        conn: &Connection,
        entry_id: i64,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let changed = conn.execute(
            r#"UPDATE pool_entry
               SET status = 'available', assigned_variant_id = NULL, assigned_at = NULL,
                   sku = NULL, title = NULL, updated_at = ?1
               WHERE id = ?2 AND status = 'assigned'"#,
            params![now, entry_id],
        )?;
        Ok(changed == 1)
    }

    pub fn find_by_id_tx(conn: &Connection, entry_id: i64) -> RepositoryResult<Option<PoolEntry>> {
        let sql = format!("SELECT {} FROM pool_entry WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![entry_id], Self::map_row).optional()?)
    }

    pub fn find_by_code_tx(conn: &Connection, code: &str) -> RepositoryResult<Option<PoolEntry>> {
        let sql = format!("SELECT {} FROM pool_entry WHERE code = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![code], Self::map_row).optional()?)
    }

    /// 查找指定条码且分配给指定变体的条目
    pub fn find_assigned_tx(
        conn: &Connection,
        code: &str,
        variant_id: &str,
    ) -> RepositoryResult<Option<PoolEntry>> {
        let sql = format!(
            "SELECT {} FROM pool_entry WHERE code = ?1 AND assigned_variant_id = ?2",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![code, variant_id], Self::map_row)
            .optional()?)
    }

    /// 查找分配给指定变体的某类型条目（变体侧记录缺失时用于自愈）
    pub fn find_by_variant_and_type_tx(
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> RepositoryResult<Option<PoolEntry>> {
        let sql = format!(
            r#"SELECT {} FROM pool_entry
               WHERE assigned_variant_id = ?1 AND code_type = ?2
               ORDER BY assigned_at ASC, id ASC
               LIMIT 1"#,
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![variant_id, code_type.to_db_str()], Self::map_row)
            .optional()?)
    }

    // ==========================================
    // 只读查询
    // ==========================================

    pub fn find_by_id(&self, entry_id: i64) -> RepositoryResult<Option<PoolEntry>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, entry_id)
    }

    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<PoolEntry>> {
        let conn = self.get_conn()?;
        Self::find_by_code_tx(&conn, code)
    }

    /// 查询分配给某变体的全部条目
    pub fn find_by_variant(&self, variant_id: &str) -> RepositoryResult<Vec<PoolEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM pool_entry WHERE assigned_variant_id = ?1 ORDER BY code_type, id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![variant_id], Self::map_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 按导入批次查询条目（按导入位置排序）
    pub fn find_by_batch(&self, import_batch_id: &str) -> RepositoryResult<Vec<PoolEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM pool_entry WHERE import_batch_id = ?1 ORDER BY row_number, id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![import_batch_id], Self::map_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 指定条码类型下的状态分布
    pub fn count_by_status_tx(
        conn: &Connection,
        code_type: CodeType,
    ) -> RepositoryResult<StatusCounts> {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM pool_entry WHERE code_type = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![code_type.to_db_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status_raw, count) = row?;
            match PoolStatus::parse(&status_raw) {
                Some(PoolStatus::Available) => counts.available = count,
                Some(PoolStatus::Assigned) => counts.assigned = count,
                Some(PoolStatus::Reserved) => counts.reserved = count,
                Some(PoolStatus::LegacyArchive) => counts.legacy_archive = count,
                Some(PoolStatus::Problematic) => counts.problematic = count,
                None => {
                    return Err(RepositoryError::FieldValueError {
                        field: "status".to_string(),
                        message: format!("未知条目状态: {}", status_raw),
                    })
                }
            }
        }
        Ok(counts)
    }

    /// 可立即分配的条目数（available ∧ type ∧ quality ≥ min_quality）
    pub fn count_ready_tx(
        conn: &Connection,
        code_type: CodeType,
        min_quality: i32,
    ) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            r#"SELECT COUNT(*) FROM pool_entry
               WHERE status = 'available' AND code_type = ?1 AND quality_score >= ?2"#,
            params![code_type.to_db_str(), min_quality],
            |row| row.get(0),
        )?)
    }

    /// 可用条目的质量分布
    ///
    /// # 返回
    /// - (high, low): quality_score ≥ threshold 的数量 / 其余数量
    pub fn count_available_quality_split_tx(
        conn: &Connection,
        code_type: CodeType,
        threshold: i32,
    ) -> RepositoryResult<(i64, i64)> {
        Ok(conn.query_row(
            r#"SELECT
                   COALESCE(SUM(CASE WHEN quality_score >= ?2 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN quality_score < ?2 THEN 1 ELSE 0 END), 0)
               FROM pool_entry
               WHERE status = 'available' AND code_type = ?1"#,
            params![code_type.to_db_str(), threshold],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }

    /// 池中出现过的条码类型
    pub fn list_code_types_tx(conn: &Connection) -> RepositoryResult<Vec<CodeType>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT code_type FROM pool_entry ORDER BY code_type")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut types = Vec::new();
        for raw in rows {
            if let Some(code_type) = CodeType::parse(&raw?) {
                types.push(code_type);
            }
        }
        types.sort();
        Ok(types)
    }

    /// 导入批次汇总（最近的批次在前）
    pub fn list_import_batches(&self, limit: i64) -> RepositoryResult<Vec<ImportBatchInfo>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT import_batch_id,
                   COUNT(*),
                   SUM(CASE WHEN status = 'available' THEN 1 ELSE 0 END),
                   SUM(CASE WHEN status = 'assigned' THEN 1 ELSE 0 END),
                   SUM(CASE WHEN status = 'legacy_archive' THEN 1 ELSE 0 END),
                   SUM(CASE WHEN status = 'problematic' THEN 1 ELSE 0 END),
                   MIN(created_at)
            FROM pool_entry
            GROUP BY import_batch_id
            ORDER BY MIN(created_at) DESC, import_batch_id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ImportBatchInfo {
                import_batch_id: row.get(0)?,
                entry_count: row.get(1)?,
                available_count: row.get(2)?,
                assigned_count: row.get(3)?,
                legacy_archive_count: row.get(4)?,
                problematic_count: row.get(5)?,
                first_created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
