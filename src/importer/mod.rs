// ==========================================
// 客户档案管理系统 - 导入层
// ==========================================
// 职责: 外部文件 → 客户记录（批量导入 + 亲属关系一致性）
// 支持: Excel (.xlsx/.xls), CSV
// 流程: 解析 → 规范化 → 校验 → 亲属解析 → 落库 → 报告
// ==========================================

// 模块声明
pub mod batch_coordinator;
pub mod cancellation;
pub mod customer_importer_trait;
pub mod error;
pub mod family_resolver;
pub mod file_parser;
pub mod record_validator;
pub mod row_normalizer;
pub mod store_guard;

// 重导出核心类型
pub use batch_coordinator::BatchCoordinator;
pub use cancellation::ImportCancellation;
pub use error::{ImportError, ImportResult};
pub use family_resolver::{lookup_targets, FamilyResolverImpl, LookupTargets, PersistedLookup};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use record_validator::{validate_batch, BatchNicSet, RecordValidatorImpl, ValidationContext};
pub use row_normalizer::{AddressColumns, ColumnSchema, RowNormalizerImpl};
pub use store_guard::{StoreFailure, StoreGuard};

// 重导出 Trait 接口
pub use customer_importer_trait::{
    CustomerImporter, FamilyResolver, FileParser, RecordValidator, RowNormalizer,
};
