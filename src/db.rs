// ==========================================
// 条码池分配引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少多进程并发分配时的偶发 busy 错误
// - 提供幂等建表（pool_entry / variant_code / config_kv）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 打开连接并确保 schema 存在（应用启动 / CLI 使用）
pub fn open_and_ensure_schema(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 幂等建表
///
/// pool_entry 上的 CHECK 约束直接在存储层兜底两条不变量:
/// - status = 'assigned' ⇔ assigned_variant_id 非空
/// - quality_score ∈ [1, 10]
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS pool_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            code_type TEXT NOT NULL CHECK(code_type IN
                ('EAN13', 'EAN8', 'UPC', 'CODE128', 'CODE39', 'CODABAR', 'QRCODE')),
            status TEXT NOT NULL CHECK(status IN
                ('available', 'assigned', 'reserved', 'legacy_archive', 'problematic')),
            quality_score INTEGER NOT NULL CHECK(quality_score BETWEEN 1 AND 10),
            is_legacy INTEGER NOT NULL DEFAULT 0,
            row_number INTEGER NOT NULL,
            assigned_variant_id TEXT,
            assigned_at TEXT,
            import_batch_id TEXT NOT NULL,
            legacy_sku TEXT,
            legacy_status TEXT,
            legacy_product_name TEXT,
            legacy_brand TEXT,
            legacy_updated TEXT,
            legacy_notes TEXT,
            notes TEXT,
            sku TEXT,
            title TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK ((status = 'assigned') = (assigned_variant_id IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_pool_entry_candidate
            ON pool_entry(status, code_type, quality_score, row_number, id);
        CREATE INDEX IF NOT EXISTS idx_pool_entry_variant
            ON pool_entry(assigned_variant_id);
        CREATE INDEX IF NOT EXISTS idx_pool_entry_batch
            ON pool_entry(import_batch_id);

        CREATE TABLE IF NOT EXISTS variant_code (
            variant_id TEXT NOT NULL,
            code_type TEXT NOT NULL,
            code TEXT NOT NULL,
            attached_at TEXT NOT NULL,
            PRIMARY KEY (variant_id, code_type)
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
