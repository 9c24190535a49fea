// ==========================================
// 条码池分配引擎 - 条码池条目领域模型
// ==========================================
// 对齐: pool_entry 表（见 db::ensure_schema）
// 不变量:
// - status = Assigned ⇔ assigned_variant_id 非空
// - code 全池唯一
// - quality_score ∈ [1, 10]，导入时计算，之后不可变
// ==========================================

use crate::domain::types::{CodeType, PoolStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PoolEntry - 条码池条目（已持久化）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub id: i64,
    pub code: String,
    pub code_type: CodeType,
    pub status: PoolStatus,
    pub quality_score: i32,
    pub is_legacy: bool,
    pub row_number: i64, // 原始导入位置（历史判定 + 分配优先级）

    // ===== 分配信息 =====
    pub assigned_variant_id: Option<String>,
    pub assigned_at: Option<NaiveDateTime>,

    pub import_batch_id: String,

    // ===== 历史元数据（导入时一次写入）=====
    pub legacy_sku: Option<String>,
    pub legacy_status: Option<String>,
    pub legacy_product_name: Option<String>,
    pub legacy_brand: Option<String>,
    pub legacy_updated: Option<String>,
    pub legacy_notes: Option<String>,
    pub notes: Option<String>,

    // ===== 分配时冗余（仅供报表，非权威数据）=====
    pub sku: Option<String>,
    pub title: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// NewPoolEntry - 待插入条目（导入管道产物）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPoolEntry {
    pub code: String,
    pub code_type: CodeType,
    pub status: PoolStatus,
    pub quality_score: i32,
    pub is_legacy: bool,
    pub row_number: i64,
    pub import_batch_id: String,
    pub legacy_sku: Option<String>,
    pub legacy_status: Option<String>,
    pub legacy_product_name: Option<String>,
    pub legacy_brand: Option<String>,
    pub legacy_updated: Option<String>,
    pub legacy_notes: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// RawPoolRow - 原始导入行（位置列映射后）
// ==========================================
// 位置列约定:
// [0]=code [1]=type [2]=status_hint [3]=legacy_sku [4]=legacy_status
// [5]=legacy_product_name [6]=legacy_brand [7]=legacy_updated [8]=保留 [9]=notes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoolRow {
    pub row_number: i64,
    pub code: String,
    pub type_raw: String,
    pub status_hint: String,
    pub legacy_sku: String,
    pub legacy_status: String,
    pub legacy_product_name: String,
    pub legacy_brand: String,
    pub legacy_updated: String,
    pub notes: String,
}

// ==========================================
// ImportSummary - 导入结果统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub import_batch_id: String,
    pub total_rows: usize,        // 输入行数
    pub total_processed: usize,   // 实际写入条目数
    pub legacy_count: usize,      // 其中 legacy_archive
    pub available_count: usize,   // 其中 available
    pub problematic_count: usize, // 其中 problematic
    pub skipped_count: usize,     // 空码/未知类型/重复码
    pub chunks_committed: usize,
    pub elapsed_ms: u64,
}

// ==========================================
// ImportBatchInfo - 导入批次汇总（按 import_batch_id 聚合）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchInfo {
    pub import_batch_id: String,
    pub entry_count: i64,
    pub available_count: i64,
    pub assigned_count: i64,
    pub legacy_archive_count: i64,
    pub problematic_count: i64,
    pub first_created_at: Option<String>,
}
