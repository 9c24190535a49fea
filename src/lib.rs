// ==========================================
// 条码池分配引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 历史条码导入、质量评分、按变体一次性分配与回收
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配/释放/报表
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 计数与耗时统计
pub mod perf;

// 应用层 - 服务组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CodeType, PoolStatus, SupplyStatus};

// 领域实体
pub use domain::{
    AllocateRequest, AllocationOutcome, AvailabilityReport, BulkAssignRequest, BulkAssignResult,
    ImportSummary, PoolEntry, ReleaseOutcome, ReleaseRequest, VariantRef,
};

// 引擎
pub use engine::{Allocator, AvailabilityReporter, BulkAssigner, PoolError, Releaser};

// 导入
pub use importer::{ImportOptions, PoolImporter, PoolImporterImpl};

// 应用
pub use app::{get_default_db_path, PoolService};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "条码池分配引擎";
