// ==========================================
// 客户档案管理系统 - 导入运行参数
// ==========================================
// 职责: 一次批量导入运行所需的全部可调参数（快照）
// 来源: config_kv 经 ImportConfigReader 读取；缺省时使用默认值
// ==========================================

use crate::domain::types::ValidationMode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认 Repository 调用超时（毫秒）
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// 默认超时重试次数
pub const DEFAULT_STORE_RETRIES: u32 = 1;

/// 默认并发查询宽度
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

// ==========================================
// ImportConfig - 导入配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub validation_mode: ValidationMode,
    pub store_timeout_ms: u64,
    pub store_retries: u32,
    pub lookup_concurrency: usize,

    /// 校验“出生日期不得晚于当前日期”所用的日期；None 表示运行当天
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::default(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            store_retries: DEFAULT_STORE_RETRIES,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            as_of: None,
        }
    }
}

impl ImportConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// 本次运行的“当前日期”
    pub fn today(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn with_store_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.store_timeout_ms = timeout_ms;
        self
    }

    pub fn with_as_of(mut self, today: NaiveDate) -> Self {
        self.as_of = Some(today);
        self
    }
}
