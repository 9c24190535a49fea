// ==========================================
// 条码池分配引擎 - 应用层
// ==========================================
// 职责: 组装各层组件，对外提供统一入口
// ==========================================

pub mod service;

// 重导出
pub use service::{get_default_db_path, PoolService};
