// ==========================================
// 客户档案管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config::{
    DEFAULT_LOOKUP_CONCURRENCY, DEFAULT_STORE_RETRIES, DEFAULT_STORE_TIMEOUT_MS,
};
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::ValidationMode;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

// ==========================================
// ConfigError - 配置层错误
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置值非法: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("锁获取失败: {0}")]
    LockError(String),
}

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
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        tracing::info!(key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取并解析数值配置；缺省时返回默认值，格式非法时报错
    fn get_parsed_or_default<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    /// 获取界面语言（ui.locale），默认 zh-CN
    pub fn get_locale(&self) -> Result<String, ConfigError> {
        Ok(self
            .get_config_value(config_keys::UI_LOCALE)?
            .unwrap_or_else(|| "zh-CN".to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 导入批次记录时附带当时的配置，便于追溯
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_validation_mode(&self) -> Result<ValidationMode, ConfigError> {
        match self.get_config_value(config_keys::VALIDATION_MODE)? {
            None => Ok(ValidationMode::default()),
            Some(raw) => ValidationMode::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: config_keys::VALIDATION_MODE.to_string(),
                value: raw,
            }),
        }
    }

    async fn get_store_timeout_ms(&self) -> Result<u64, ConfigError> {
        let value =
            self.get_parsed_or_default(config_keys::STORE_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS)?;
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                key: config_keys::STORE_TIMEOUT_MS.to_string(),
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    async fn get_store_retries(&self) -> Result<u32, ConfigError> {
        self.get_parsed_or_default(config_keys::STORE_RETRIES, DEFAULT_STORE_RETRIES)
    }

    async fn get_lookup_concurrency(&self) -> Result<usize, ConfigError> {
        let value = self
            .get_parsed_or_default(config_keys::LOOKUP_CONCURRENCY, DEFAULT_LOOKUP_CONCURRENCY)?;
        Ok(value.max(1))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批量导入
    pub const VALIDATION_MODE: &str = "import.validation_mode";
    pub const STORE_TIMEOUT_MS: &str = "import.store_timeout_ms";
    pub const STORE_RETRIES: &str = "import.store_retries";
    pub const LOOKUP_CONCURRENCY: &str = "import.lookup_concurrency";

    // 界面
    pub const UI_LOCALE: &str = "ui.locale";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let manager = memory_manager();
        let config = manager.load_import_config().await.unwrap();

        assert_eq!(config.validation_mode, ValidationMode::CollectAll);
        assert_eq!(config.store_timeout_ms, DEFAULT_STORE_TIMEOUT_MS);
        assert_eq!(config.store_retries, DEFAULT_STORE_RETRIES);
        assert_eq!(manager.get_locale().unwrap(), "zh-CN");
    }

    #[tokio::test]
    async fn test_set_and_read_back() {
        let manager = memory_manager();
        manager
            .set_config_value(config_keys::VALIDATION_MODE, "FAIL_FAST")
            .unwrap();
        manager
            .set_config_value(config_keys::STORE_TIMEOUT_MS, "250")
            .unwrap();

        let config = manager.load_import_config().await.unwrap();
        assert_eq!(config.validation_mode, ValidationMode::FailFast);
        assert_eq!(config.store_timeout_ms, 250);

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_value_is_error() {
        let manager = memory_manager();
        manager
            .set_config_value(config_keys::STORE_RETRIES, "many")
            .unwrap();

        let err = manager.get_store_retries().await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        manager
            .set_config_value(config_keys::VALIDATION_MODE, "strict")
            .unwrap();
        assert!(manager.get_validation_mode().await.is_err());
    }
}
