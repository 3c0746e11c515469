// ==========================================
// 客户档案管理系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义批量导入所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::ConfigError;
use crate::config::import_config::ImportConfig;
use crate::domain::types::ValidationMode;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 批量导入所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取校验模式
    ///
    /// # 默认值
    /// - COLLECT_ALL
    async fn get_validation_mode(&self) -> Result<ValidationMode, ConfigError>;

    /// 获取单次 Repository 调用超时（毫秒）
    ///
    /// # 默认值
    /// - 5000
    async fn get_store_timeout_ms(&self) -> Result<u64, ConfigError>;

    /// 获取超时后的重试次数
    ///
    /// # 默认值
    /// - 1
    async fn get_store_retries(&self) -> Result<u32, ConfigError>;

    /// 获取存在性查询的并发宽度
    ///
    /// # 默认值
    /// - 8
    async fn get_lookup_concurrency(&self) -> Result<usize, ConfigError>;

    /// 汇总为一次导入运行的配置快照
    async fn load_import_config(&self) -> Result<ImportConfig, ConfigError> {
        Ok(ImportConfig {
            validation_mode: self.get_validation_mode().await?,
            store_timeout_ms: self.get_store_timeout_ms().await?,
            store_retries: self.get_store_retries().await?,
            lookup_concurrency: self.get_lookup_concurrency().await?,
            as_of: None,
        })
    }
}
