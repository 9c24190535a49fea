// ==========================================
// 条码池分配引擎 - 分配/释放/批量请求与结果
// ==========================================
// 每个操作一个显式的类型化请求结构:
// Allocate(variant, type) / Release(variant, type) / BulkAssign(variants, type)
// ==========================================

use crate::domain::pool_entry::PoolEntry;
use crate::domain::types::CodeType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// VariantRef - 请求方变体引用
// ==========================================
// sku / title 仅用于分配时冗余到条目上
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRef {
    pub variant_id: String,
    pub sku: Option<String>,
    pub title: Option<String>,
}

impl VariantRef {
    pub fn new(variant_id: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            sku: None,
            title: None,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

// ==========================================
// VariantCode - 变体侧已挂载条码记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCode {
    pub variant_id: String,
    pub code_type: CodeType,
    pub code: String,
    pub attached_at: NaiveDateTime,
}

// ==========================================
// 分配
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateRequest {
    pub variant: VariantRef,
    pub code_type: CodeType,
    /// None 表示使用配置 pool/min_quality
    pub min_quality: Option<i32>,
}

impl AllocateRequest {
    /// EAN13，最低质量分取配置值
    pub fn new(variant: VariantRef) -> Self {
        Self {
            variant,
            code_type: CodeType::default(),
            min_quality: None,
        }
    }

    pub fn with_type(mut self, code_type: CodeType) -> Self {
        self.code_type = code_type;
        self
    }

    pub fn with_min_quality(mut self, min_quality: i32) -> Self {
        self.min_quality = Some(min_quality);
        self
    }
}

/// 分配结果
///
/// - assigned=true: 本次新分配，entry 为刚认领的条目
/// - assigned=false: 变体已持有该类型条码（幂等返回），entry 为池中对应条目；
///   若池侧记录已丢失则为 None
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub assigned: bool,
    pub code: String,
    pub code_type: CodeType,
    pub entry: Option<PoolEntry>,
}

// ==========================================
// 释放
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub variant_id: String,
    pub code_type: CodeType,
}

impl ReleaseRequest {
    pub fn new(variant_id: impl Into<String>, code_type: CodeType) -> Self {
        Self {
            variant_id: variant_id.into(),
            code_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub released: bool,
    pub code: Option<String>,
    /// 变体侧记录存在但池中无对应条目（已自愈删除）
    pub orphaned: bool,
    pub note: Option<String>,
}

// ==========================================
// 批量分配
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignRequest {
    pub variants: Vec<VariantRef>,
    pub code_type: CodeType,
    /// None 表示使用配置 pool/min_quality
    pub min_quality: Option<i32>,
    pub skip_existing: bool,
}

impl BulkAssignRequest {
    pub fn new(variants: Vec<VariantRef>, code_type: CodeType) -> Self {
        Self {
            variants,
            code_type,
            min_quality: None,
            skip_existing: true,
        }
    }

    pub fn with_min_quality(mut self, min_quality: i32) -> Self {
        self.min_quality = Some(min_quality);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignFailure {
    pub variant_id: String,
    pub sku: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignResult {
    pub processed: usize,
    pub assigned: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub errors: Vec<BulkAssignFailure>,
    pub success: bool,
    pub summary: String,
}
