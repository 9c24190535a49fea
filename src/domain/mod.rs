// ==========================================
// 条码池分配引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、请求/结果结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod pool_entry;
pub mod report;
pub mod types;

// 重导出核心类型
pub use allocation::{
    AllocateRequest, AllocationOutcome, BulkAssignFailure, BulkAssignRequest, BulkAssignResult,
    ReleaseOutcome, ReleaseRequest, VariantCode, VariantRef,
};
pub use pool_entry::{ImportBatchInfo, ImportSummary, NewPoolEntry, PoolEntry, RawPoolRow};
pub use report::{AvailabilityReport, StatusCounts};
pub use types::{CodeType, PoolStatus, SupplyStatus};
