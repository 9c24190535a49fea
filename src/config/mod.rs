// ==========================================
// 条码池分配引擎 - 配置层
// ==========================================
// 职责: 导入阈值、分配参数、报表阈值的统一管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pool_config_trait;
pub mod pool_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use pool_config_trait::PoolConfigReader;
pub use pool_settings::PoolSettings;
