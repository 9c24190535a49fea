// ==========================================
// 条码池分配引擎 - 引擎层
// ==========================================
// 职责: 分配 / 释放 / 批量分配 / 可用性报表
// 红线: Engine 不拼 SQL，数据访问一律经由 repository
// ==========================================

pub mod allocator;
pub mod availability;
pub mod bulk_assigner;
pub mod error;
pub mod releaser;

// 重导出核心引擎
pub use allocator::Allocator;
pub use availability::{AvailabilityReporter, SupplyFlags};
pub use bulk_assigner::BulkAssigner;
pub use error::{PoolError, PoolResult};
pub use releaser::Releaser;
