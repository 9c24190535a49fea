// ==========================================
// 条码池分配引擎 - 池配置快照
// ==========================================
// 一次性读出全部配置，引擎持有快照而非每次查询 config_kv
// ==========================================

use crate::config::pool_config_trait::PoolConfigReader;
use serde::{Deserialize, Serialize};
use std::error::Error;

pub const DEFAULT_LEGACY_ROW_THRESHOLD: i64 = 40_000;
pub const DEFAULT_IMPORT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_MIN_QUALITY: i32 = 7;
pub const DEFAULT_MAX_CLAIM_ATTEMPTS: u32 = 3;
pub const DEFAULT_HIGH_QUALITY_THRESHOLD: i32 = 7;
pub const DEFAULT_SUFFICIENT_SUPPLY_THRESHOLD: i64 = 1_000;
pub const DEFAULT_LOW_SUPPLY_THRESHOLD: i64 = 100;
pub const DEFAULT_CRITICAL_SUPPLY_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub legacy_row_threshold: i64,
    pub import_chunk_size: usize,
    pub min_quality: i32,
    pub max_claim_attempts: u32,
    pub high_quality_threshold: i32,
    pub sufficient_supply_threshold: i64,
    pub low_supply_threshold: i64,
    pub critical_supply_threshold: i64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            legacy_row_threshold: DEFAULT_LEGACY_ROW_THRESHOLD,
            import_chunk_size: DEFAULT_IMPORT_CHUNK_SIZE,
            min_quality: DEFAULT_MIN_QUALITY,
            max_claim_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
            high_quality_threshold: DEFAULT_HIGH_QUALITY_THRESHOLD,
            sufficient_supply_threshold: DEFAULT_SUFFICIENT_SUPPLY_THRESHOLD,
            low_supply_threshold: DEFAULT_LOW_SUPPLY_THRESHOLD,
            critical_supply_threshold: DEFAULT_CRITICAL_SUPPLY_THRESHOLD,
        }
    }
}

impl PoolSettings {
    /// 从配置读取器加载快照
    pub fn load<C: PoolConfigReader + ?Sized>(reader: &C) -> Result<Self, Box<dyn Error>> {
        let settings = Self {
            legacy_row_threshold: reader.get_legacy_row_threshold()?,
            import_chunk_size: reader.get_import_chunk_size()?,
            min_quality: reader.get_min_quality()?,
            max_claim_attempts: reader.get_max_claim_attempts()?,
            high_quality_threshold: reader.get_high_quality_threshold()?,
            sufficient_supply_threshold: reader.get_sufficient_supply_threshold()?,
            low_supply_threshold: reader.get_low_supply_threshold()?,
            critical_supply_threshold: reader.get_critical_supply_threshold()?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 配置一致性校验
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.min_quality) {
            return Err(format!("min_quality 超出范围 [1,10]: {}", self.min_quality));
        }
        if !(1..=10).contains(&self.high_quality_threshold) {
            return Err(format!(
                "high_quality_threshold 超出范围 [1,10]: {}",
                self.high_quality_threshold
            ));
        }
        if self.import_chunk_size == 0 {
            return Err("import_chunk_size 必须大于 0".to_string());
        }
        if self.max_claim_attempts == 0 {
            return Err("max_claim_attempts 必须大于 0".to_string());
        }
        if self.critical_supply_threshold > self.low_supply_threshold {
            return Err(format!(
                "critical_supply_threshold({}) 不应大于 low_supply_threshold({})",
                self.critical_supply_threshold, self.low_supply_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = PoolSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.legacy_row_threshold, 40_000);
        assert_eq!(settings.import_chunk_size, 1_000);
    }

    #[test]
    fn test_validate_rejects_inverted_supply_thresholds() {
        let settings = PoolSettings {
            critical_supply_threshold: 500,
            ..PoolSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
