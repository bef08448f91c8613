// ==========================================
// 薪资导入对账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id + key → value)
// 说明: 未配置时使用默认值；已配置但非法时报错，不静默回退
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::ContractState;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

const GLOBAL_SCOPE: &str = "global";

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置存储访问失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),

    #[error("配置值非法 (key={key}, value={value}): {reason}")]
    ConfigValueError {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                    scope_id TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map).to_string())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::ConfigValueError {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_header_rows(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(config_keys::HEADER_ROWS, "1")?;
        value
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(config_keys::HEADER_ROWS, &value, e.to_string()))
    }

    fn get_reference_sequence_code(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(
            config_keys::REFERENCE_SEQUENCE_CODE,
            defaults::REFERENCE_SEQUENCE_CODE,
        )?;
        let code = value.trim();
        if code.is_empty() {
            return Err(invalid(
                config_keys::REFERENCE_SEQUENCE_CODE,
                &value,
                "序列代码不能为空",
            ));
        }
        Ok(code.to_string())
    }

    fn get_contract_states(&self) -> ConfigResult<Vec<ContractState>> {
        let value = self.get_config_or_default(config_keys::CONTRACT_STATES, "open,close")?;

        let mut states = Vec::new();
        for part in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let state = ContractState::from_str(part)
                .map_err(|e| invalid(config_keys::CONTRACT_STATES, &value, e))?;
            if !states.contains(&state) {
                states.push(state);
            }
        }

        if states.is_empty() {
            return Err(invalid(
                config_keys::CONTRACT_STATES,
                &value,
                "至少需要一个合同状态",
            ));
        }
        Ok(states)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const HEADER_ROWS: &str = "header_rows";
    pub const REFERENCE_SEQUENCE_CODE: &str = "reference_sequence_code";

    // 对账
    pub const CONTRACT_STATES: &str = "contract_states";
}

pub mod defaults {
    pub const REFERENCE_SEQUENCE_CODE: &str = "payroll.import";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn setup() -> ConfigManager {
        ConfigManager::from_connection(open_in_memory_connection().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.get_header_rows().unwrap(), 1);
        assert_eq!(
            config.get_reference_sequence_code().unwrap(),
            "payroll.import"
        );
        assert_eq!(
            config.get_contract_states().unwrap(),
            vec![ContractState::Open, ContractState::Close]
        );
    }

    #[test]
    fn test_overrides_are_read() {
        let config = setup();
        config.set_global_config_value("header_rows", "2").unwrap();
        config
            .set_global_config_value("contract_states", "OPEN")
            .unwrap();

        assert_eq!(config.get_header_rows().unwrap(), 2);
        assert_eq!(
            config.get_contract_states().unwrap(),
            vec![ContractState::Open]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = setup();
        config.set_global_config_value("header_rows", "-1").unwrap();
        config
            .set_global_config_value("contract_states", "open,bogus")
            .unwrap();

        assert!(matches!(
            config.get_header_rows(),
            Err(ConfigError::ConfigValueError { .. })
        ));
        assert!(matches!(
            config.get_contract_states(),
            Err(ConfigError::ConfigValueError { .. })
        ));
    }

    #[test]
    fn test_snapshot_contains_overrides() {
        let config = setup();
        config
            .set_global_config_value("reference_sequence_code", "payroll.custom")
            .unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["reference_sequence_code"], "payroll.custom");
    }
}
