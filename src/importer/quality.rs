// ==========================================
// 条码池分配引擎 - 质量评分与状态判定
// ==========================================
// 评分: 从 10 开始依次扣分，最后夹到 [1, 10]
// - 行号 < 历史阈值        -3
// - 条码长度 < 12          -2
// - 原状态含 error/invalid/problem（不区分大小写） -3
// - 品名为空               -1
// - 品牌为空               -1
// 状态: legacy_archive > problematic > available
// ==========================================

use crate::config::pool_settings::DEFAULT_LEGACY_ROW_THRESHOLD;
use crate::domain::pool_entry::RawPoolRow;
use crate::domain::types::PoolStatus;

pub const MAX_QUALITY: i32 = 10;
pub const MIN_QUALITY: i32 = 1;

/// 条码最短“完整”长度（EAN13/UPC-A 级别）
const FULL_CODE_LEN: usize = 12;

const PROBLEM_MARKERS: [&str; 3] = ["error", "invalid", "problem"];

const HINT_LEGACY_ARCHIVE: &str = "legacy_archive";

/// 原状态是否标记为有问题
pub fn is_problem_status(legacy_status: &str) -> bool {
    let lower = legacy_status.to_lowercase();
    PROBLEM_MARKERS.iter().any(|m| lower.contains(m))
}

// ==========================================
// QualityScorer
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    legacy_row_threshold: i64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_LEGACY_ROW_THRESHOLD)
    }
}

impl QualityScorer {
    pub fn new(legacy_row_threshold: i64) -> Self {
        Self {
            legacy_row_threshold,
        }
    }

    fn below_threshold(&self, row: &RawPoolRow) -> bool {
        row.row_number < self.legacy_row_threshold
    }

    pub fn score(&self, row: &RawPoolRow) -> i32 {
        let mut score = MAX_QUALITY;

        if self.below_threshold(row) {
            score -= 3;
        }
        if row.code.chars().count() < FULL_CODE_LEN {
            score -= 2;
        }
        if is_problem_status(&row.legacy_status) {
            score -= 3;
        }
        if row.legacy_product_name.is_empty() {
            score -= 1;
        }
        if row.legacy_brand.is_empty() {
            score -= 1;
        }

        score.clamp(MIN_QUALITY, MAX_QUALITY)
    }

    pub fn is_legacy(&self, row: &RawPoolRow) -> bool {
        row.status_hint == HINT_LEGACY_ARCHIVE || self.below_threshold(row)
    }

    pub fn classify(&self, row: &RawPoolRow) -> PoolStatus {
        if self.is_legacy(row) {
            PoolStatus::LegacyArchive
        } else if is_problem_status(&row.legacy_status) {
            PoolStatus::Problematic
        } else {
            PoolStatus::Available
        }
    }

    /// 拼接历史元数据摘要（仅非空字段，顺序固定）
    pub fn legacy_notes(&self, row: &RawPoolRow) -> Option<String> {
        let parts: Vec<String> = [
            ("Legacy SKU", &row.legacy_sku),
            ("Product", &row.legacy_product_name),
            ("Brand", &row.legacy_brand),
            ("Last Updated", &row.legacy_updated),
            ("Original Status", &row.legacy_status),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }
}
