// ==========================================
// 条码池分配引擎 - 领域类型定义
// ==========================================
// 序列化格式与数据库一致:
// - CodeType: 全大写（EAN13 / CODE128 ...）
// - PoolStatus: snake_case（available / legacy_archive ...）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 条码类型 (Code Type)
// ==========================================
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeType {
    #[default]
    Ean13,
    Ean8,
    Upc,
    Code128,
    Code39,
    Codabar,
    Qrcode,
}

impl CodeType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CodeType::Ean13 => "EAN13",
            CodeType::Ean8 => "EAN8",
            CodeType::Upc => "UPC",
            CodeType::Code128 => "CODE128",
            CodeType::Code39 => "CODE39",
            CodeType::Codabar => "CODABAR",
            CodeType::Qrcode => "QRCODE",
        }
    }

    /// 宽松解析（忽略大小写、空白、连字符/下划线）
    ///
    /// 历史表格里常见 "ean-13" / "Code 128" / "qr_code" 这类写法
    pub fn parse(raw: &str) -> Option<CodeType> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_uppercase();
        match normalized.as_str() {
            "EAN13" => Some(CodeType::Ean13),
            "EAN8" => Some(CodeType::Ean8),
            "UPC" | "UPCA" => Some(CodeType::Upc),
            "CODE128" => Some(CodeType::Code128),
            "CODE39" => Some(CodeType::Code39),
            "CODABAR" => Some(CodeType::Codabar),
            "QRCODE" | "QR" => Some(CodeType::Qrcode),
            _ => None,
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 条码池状态 (Pool Status)
// ==========================================
// 状态转换:
// - 导入时一次性确定 available / legacy_archive / problematic
// - available ⇄ assigned 只由分配器/释放器驱动
// - reserved: 可查询的预留扩展点，本引擎不产生该状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Available,     // 可分配
    Assigned,      // 已分配
    Reserved,      // 预留（扩展点）
    LegacyArchive, // 历史归档
    Problematic,   // 问题条码
}

impl PoolStatus {
    pub const ALL: [PoolStatus; 5] = [
        PoolStatus::Available,
        PoolStatus::Assigned,
        PoolStatus::Reserved,
        PoolStatus::LegacyArchive,
        PoolStatus::Problematic,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            PoolStatus::Available => "available",
            PoolStatus::Assigned => "assigned",
            PoolStatus::Reserved => "reserved",
            PoolStatus::LegacyArchive => "legacy_archive",
            PoolStatus::Problematic => "problematic",
        }
    }

    pub fn parse(raw: &str) -> Option<PoolStatus> {
        match raw.trim().to_lowercase().as_str() {
            "available" => Some(PoolStatus::Available),
            "assigned" => Some(PoolStatus::Assigned),
            "reserved" => Some(PoolStatus::Reserved),
            "legacy_archive" => Some(PoolStatus::LegacyArchive),
            "problematic" => Some(PoolStatus::Problematic),
            _ => None,
        }
    }

    /// 是否属于“活跃池”（非归档、非问题条码）
    pub fn is_active(&self) -> bool {
        !matches!(self, PoolStatus::LegacyArchive | PoolStatus::Problematic)
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 供给健康等级 (Supply Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyStatus {
    Critical,  // 告急
    Low,       // 偏低
    Good,      // 正常
    Excellent, // 充足
}

impl fmt::Display for SupplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplyStatus::Critical => write!(f, "critical"),
            SupplyStatus::Low => write!(f, "low"),
            SupplyStatus::Good => write!(f, "good"),
            SupplyStatus::Excellent => write!(f, "excellent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_type_parse_lenient() {
        assert_eq!(CodeType::parse("EAN13"), Some(CodeType::Ean13));
        assert_eq!(CodeType::parse(" ean-13 "), Some(CodeType::Ean13));
        assert_eq!(CodeType::parse("Code 128"), Some(CodeType::Code128));
        assert_eq!(CodeType::parse("qr_code"), Some(CodeType::Qrcode));
        assert_eq!(CodeType::parse("ISBN"), None);
    }

    #[test]
    fn test_pool_status_db_roundtrip() {
        for status in PoolStatus::ALL {
            assert_eq!(PoolStatus::parse(status.to_db_str()), Some(status));
        }
        assert!(PoolStatus::Reserved.is_active());
        assert!(!PoolStatus::LegacyArchive.is_active());
        assert!(!PoolStatus::Problematic.is_active());
    }

    #[test]
    fn test_serde_format_matches_db() {
        assert_eq!(serde_json::to_string(&CodeType::Code128).unwrap(), "\"CODE128\"");
        assert_eq!(
            serde_json::to_string(&PoolStatus::LegacyArchive).unwrap(),
            "\"legacy_archive\""
        );
    }
}
