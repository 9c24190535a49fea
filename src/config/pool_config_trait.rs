// ==========================================
// 条码池分配引擎 - 池配置读取 Trait
// ==========================================
// 职责: 定义导入/分配/报表所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;

// ==========================================
// PoolConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait PoolConfigReader: Send + Sync {
    // ===== 导入配置 =====

    /// 历史行号阈值：row_number 小于该值视为历史条码
    ///
    /// # 默认值
    /// - 40000
    fn get_legacy_row_threshold(&self) -> Result<i64, Box<dyn Error>>;

    /// 导入分块大小
    ///
    /// # 默认值
    /// - 1000
    fn get_import_chunk_size(&self) -> Result<usize, Box<dyn Error>>;

    // ===== 分配配置 =====

    /// 默认最低质量分
    ///
    /// # 默认值
    /// - 7
    fn get_min_quality(&self) -> Result<i32, Box<dyn Error>>;

    /// 并发冲突时的最大认领尝试次数（含首次）
    ///
    /// # 默认值
    /// - 3
    fn get_max_claim_attempts(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 报表配置 =====

    /// 高质量阈值（quality_score ≥ 该值计为高质量）
    ///
    /// # 默认值
    /// - 7
    fn get_high_quality_threshold(&self) -> Result<i32, Box<dyn Error>>;

    /// 供给充足阈值（ready > 该值）
    ///
    /// # 默认值
    /// - 1000
    fn get_sufficient_supply_threshold(&self) -> Result<i64, Box<dyn Error>>;

    /// 供给偏低阈值（ready < 该值）
    ///
    /// # 默认值
    /// - 100
    fn get_low_supply_threshold(&self) -> Result<i64, Box<dyn Error>>;

    /// 供给告急阈值（ready < 该值）
    ///
    /// # 默认值
    /// - 10
    fn get_critical_supply_threshold(&self) -> Result<i64, Box<dyn Error>>;
}
