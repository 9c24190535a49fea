// ==========================================
// 条码池分配引擎 - SQL 性能观测
// ==========================================
// 职责: 慢 SQL 日志 + 单次操作耗时/语句数统计
// 开关:
// - BARCODE_POOL_PERF_SQL=1 强制开启（Debug 默认开启，Release 默认关闭）
// - BARCODE_POOL_SLOW_SQL_MS=50 慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn shorten_sql(sql: &str) -> String {
    const MAX_LEN: usize = 300;
    let flat: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(MAX_LEN) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// 为连接安装 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("BARCODE_POOL_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("BARCODE_POOL_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_sql_trace));
    conn.profile(Some(on_sql_profile));
}

fn on_sql_trace(_sql: &str) {
    SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
}

fn on_sql_profile(sql: &str, duration: Duration) {
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold > 0 && ms >= threshold {
        tracing::warn!(
            target: "slow_sql",
            duration_ms = ms,
            sql = %shorten_sql(sql),
            "慢 SQL"
        );
    }
}

/// 操作级性能 Guard：drop 时输出耗时与本线程执行的 SQL 数
///
/// ```ignore
/// let _perf = barcode_pool::perf::PerfGuard::new("import_rows");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count,
            "操作完成"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_sql_collapses_whitespace() {
        let sql = "SELECT *\n    FROM pool_entry\n    WHERE id = ?1";
        assert_eq!(shorten_sql(sql), "SELECT * FROM pool_entry WHERE id = ?1");
    }

    #[test]
    fn test_shorten_sql_truncates_long_statements() {
        let sql = "x ".repeat(400);
        let short = shorten_sql(&sql);
        assert!(short.ends_with('…'));
        assert!(short.chars().count() <= 301);
    }
}
