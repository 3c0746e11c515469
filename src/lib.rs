// ==========================================
// 客户档案管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 客户档案批量导入与亲属关系一致性
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 性能诊断（慢 SQL）
pub mod perf;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出常用类型
// ==========================================

pub use domain::{
    Address, CandidateRecord, CustomerId, CustomerRecord, FamilyRef, ImportBatch, ImportReport,
    ImportRow, ImportStatus, ImportWarning, RowOutcome, RowReport, ValidationIssue,
    ValidationMode, ValidationRule, WarningKind,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "客户档案管理系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
