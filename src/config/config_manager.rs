// ==========================================
// 条码池分配引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope，当前只使用 global)
// ==========================================

use crate::config::pool_config_trait::PoolConfigReader;
use crate::config::pool_settings::*;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const LEGACY_ROW_THRESHOLD: &str = "pool/legacy_row_threshold";
    pub const IMPORT_CHUNK_SIZE: &str = "pool/import_chunk_size";
    pub const MIN_QUALITY: &str = "pool/min_quality";
    pub const MAX_CLAIM_ATTEMPTS: &str = "pool/max_claim_attempts";
    pub const HIGH_QUALITY_THRESHOLD: &str = "pool/high_quality_threshold";
    pub const SUFFICIENT_SUPPLY_THRESHOLD: &str = "pool/sufficient_supply_threshold";
    pub const LOW_SUPPLY_THRESHOLD: &str = "pool/low_supply_threshold";
    pub const CRITICAL_SUPPLY_THRESHOLD: &str = "pool/critical_supply_threshold";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取并解析配置值，缺失时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            Some(raw) => raw.trim().parse::<T>().map_err(|e| {
                format!("配置值格式错误 (key: {}, value: {}): {}", key, raw, e).into()
            }),
            None => Ok(default),
        }
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        tracing::info!(key = %key, value = %value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 加载池配置快照
    pub fn load_pool_settings(&self) -> Result<PoolSettings, Box<dyn Error>> {
        PoolSettings::load(self)
    }
}

impl PoolConfigReader for ConfigManager {
    fn get_legacy_row_threshold(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::LEGACY_ROW_THRESHOLD, DEFAULT_LEGACY_ROW_THRESHOLD)
    }

    fn get_import_chunk_size(&self) -> Result<usize, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::IMPORT_CHUNK_SIZE, DEFAULT_IMPORT_CHUNK_SIZE)
    }

    fn get_min_quality(&self) -> Result<i32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::MIN_QUALITY, DEFAULT_MIN_QUALITY)
    }

    fn get_max_claim_attempts(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::MAX_CLAIM_ATTEMPTS, DEFAULT_MAX_CLAIM_ATTEMPTS)
    }

    fn get_high_quality_threshold(&self) -> Result<i32, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::HIGH_QUALITY_THRESHOLD,
            DEFAULT_HIGH_QUALITY_THRESHOLD,
        )
    }

    fn get_sufficient_supply_threshold(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::SUFFICIENT_SUPPLY_THRESHOLD,
            DEFAULT_SUFFICIENT_SUPPLY_THRESHOLD,
        )
    }

    fn get_low_supply_threshold(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::LOW_SUPPLY_THRESHOLD, DEFAULT_LOW_SUPPLY_THRESHOLD)
    }

    fn get_critical_supply_threshold(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::CRITICAL_SUPPLY_THRESHOLD,
            DEFAULT_CRITICAL_SUPPLY_THRESHOLD,
        )
    }
}
