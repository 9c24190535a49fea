// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别与 JSON 输出
// 日志统一写 stderr，stdout 留给 CLI 的 JSON 输出
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 初始化日志系统（人类可读格式）
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=barcode_pool=debug,slow_sql=warn
///
/// # 示例
/// ```no_run
/// use barcode_pool::logging;
/// logging::init();
/// ```
pub fn init() {
    let _ = fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// 初始化 JSON 格式日志（供日志采集使用）
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter("info"))
        .with_writer(std::io::stderr)
        .with_current_span(true)
        .try_init();
}

/// 按 BARCODE_POOL_LOG_FORMAT 选择输出格式（json / text）
pub fn init_from_env() {
    match std::env::var("BARCODE_POOL_LOG_FORMAT") {
        Ok(v) if v.trim().eq_ignore_ascii_case("json") => init_json(),
        _ => init(),
    }
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
