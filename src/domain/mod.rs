// ==========================================
// 客户档案管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、导入结果模型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod customer;
pub mod import;
pub mod types;

// 重导出核心类型
pub use customer::{Address, CandidateRecord, CustomerId, CustomerRecord, FamilyRef};
pub use import::{
    ImportBatch, ImportReport, ImportRow, ImportWarning, ReferenceStatus, ResolvedCandidate,
    ResolvedReference, RowOutcome, RowReport, ValidationIssue,
};
pub use types::{ImportStatus, ValidationMode, ValidationRule, WarningKind};
