// ==========================================
// 条码池分配引擎 - 可用性报表
// ==========================================
// 用途: 驾驶舱 / CLI 展示池健康度（只读，不改变池状态）
// ==========================================

use crate::domain::pool_entry::PoolEntry;
use crate::domain::types::{CodeType, SupplyStatus};
use serde::{Deserialize, Serialize};

/// 按状态计数（单一条码类型范围内）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub available: i64,
    pub assigned: i64,
    pub reserved: i64,
    pub legacy_archive: i64,
    pub problematic: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.available + self.assigned + self.reserved + self.legacy_archive + self.problematic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub code_type: CodeType,
    pub min_quality: i32,

    pub ready_for_assignment: i64,

    // ===== 状态分布 =====
    pub available_total: i64,
    pub assigned_total: i64,
    pub reserved_total: i64,
    pub legacy_archive_total: i64,
    pub problematic_total: i64,
    pub total_pool_size: i64,
    pub utilization_rate: f64, // 百分比

    // ===== 可用条码质量分布 =====
    pub high_quality_threshold: i32,
    pub available_high_quality: i64,
    pub available_low_quality: i64,

    pub active_pool_size: i64,
    pub legacy_pool_size: i64,

    // ===== 健康标志 =====
    pub sufficient_supply: bool,
    pub low_supply_warning: bool,
    pub critical_supply: bool,
    pub quality_ratio_good: bool,
    pub supply_status: SupplyStatus,

    /// 下一个将被分配的条目（预览，不认领）
    pub next_available: Option<PoolEntry>,
}
