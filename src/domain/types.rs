// ==========================================
// 客户档案管理系统 - 领域类型定义
// ==========================================
// 职责: 校验模式、导入状态、校验规则、警告类型等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库 / config_kv 一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 校验模式 (Validation Mode)
// ==========================================
// 默认 CollectAll: 累积所有失败规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationMode {
    #[default]
    CollectAll, // 收集全部违规
    FailFast,   // 首条违规即返回
}

impl ValidationMode {
    /// 从配置字符串解析（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "COLLECT_ALL" => Some(ValidationMode::CollectAll),
            "FAIL_FAST" => Some(ValidationMode::FailFast),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::CollectAll => write!(f, "COLLECT_ALL"),
            ValidationMode::FailFast => write!(f, "FAIL_FAST"),
        }
    }
}

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// Rejected 与 CompletedWithFailures 必须可区分:
// 前者为系统性失败（拒绝），后者为部分成功
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Completed,             // 全部成功
    CompletedWithFailures, // 部分行失败
    Rejected,              // 系统性失败，中止
    Cancelled,             // 调用方取消
}

impl ImportStatus {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportStatus::Completed => "COMPLETED",
            ImportStatus::CompletedWithFailures => "COMPLETED_WITH_FAILURES",
            ImportStatus::Rejected => "REJECTED",
            ImportStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "COMPLETED" => ImportStatus::Completed,
            "COMPLETED_WITH_FAILURES" => ImportStatus::CompletedWithFailures,
            "CANCELLED" => ImportStatus::Cancelled,
            _ => ImportStatus::Rejected,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ImportStatus::Rejected)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 校验规则 (Validation Rule)
// ==========================================
// 声明顺序即优先级顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationRule {
    NameRequired,          // 规则1: 姓名非空
    DateOfBirthInFuture,   // 规则2: 出生日期不得晚于当前日期
    NicRequired,           // 规则3: NIC 非空
    DuplicateNicInBatch,   // 规则3: 同批次内 NIC 重复
    DuplicateNicPersisted, // 规则3: 与已持久化客户 NIC 重复
    AddressLine1Required,  // 规则4: 地址第一行非空
    SelfReference,         // 规则5: 亲属引用指向自身
    StoreConstraint,       // 落库时存储层拒绝（非唯一性约束）
}

impl ValidationRule {
    /// 是否为 NIC 重复类规则
    pub fn is_duplicate_nic(&self) -> bool {
        matches!(
            self,
            ValidationRule::DuplicateNicInBatch | ValidationRule::DuplicateNicPersisted
        )
    }
}

// ==========================================
// 导入警告类型 (Warning Kind)
// ==========================================
// 警告不影响行成功
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    DanglingReference,     // 引用目标不存在，已丢弃
    InBatchTargetFailed,   // 引用的同批次记录未能落库，已丢弃
    SelfReferenceDropped,  // 引用恰为本行新分配的 ID，已丢弃
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_mode_parse() {
        assert_eq!(ValidationMode::parse("fail_fast"), Some(ValidationMode::FailFast));
        assert_eq!(
            ValidationMode::parse(" COLLECT_ALL "),
            Some(ValidationMode::CollectAll)
        );
        assert_eq!(ValidationMode::parse("strict"), None);
        assert_eq!(ValidationMode::default(), ValidationMode::CollectAll);
    }

    #[test]
    fn test_import_status_db_round_trip() {
        for status in [
            ImportStatus::Completed,
            ImportStatus::CompletedWithFailures,
            ImportStatus::Rejected,
            ImportStatus::Cancelled,
        ] {
            assert_eq!(ImportStatus::from_db_str(status.to_db_str()), status);
        }
    }
}
