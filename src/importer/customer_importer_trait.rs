// ==========================================
// 客户档案管理系统 - 客户导入 Trait
// ==========================================
// 职责: 定义批量导入管道各阶段接口（不包含实现）
// 管道: 解析 → 规范化 → 校验 → 亲属解析 → 落库
// ==========================================

use crate::domain::customer::CandidateRecord;
use crate::domain::import::{ImportReport, ImportRow, ResolvedCandidate, ValidationIssue};
use crate::importer::cancellation::ImportCancellation;
use crate::importer::error::ImportResult;
use crate::importer::family_resolver::PersistedLookup;
use crate::importer::record_validator::ValidationContext;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// CustomerImporter Trait
// ==========================================
// 用途: 批量导入主接口
// 实现者: BatchCoordinator
#[async_trait]
pub trait CustomerImporter: Send + Sync {
    /// 从文件导入客户数据（根据扩展名选择解析器）
    ///
    /// # 返回
    /// - ImportReport: 总是返回报告；文件无法读取时为 Rejected 且 totalRecords = 0
    async fn import_file(&self, file_path: &Path, cancel: &ImportCancellation) -> ImportReport;

    /// 导入已解码的行
    ///
    /// # 导入流程
    /// 1. 存储可达性预检
    /// 2. 行规范化（纯函数）
    /// 3. NIC 存在性查询（并发）+ 校验折叠（批内 NIC 累加器）
    /// 4. 亲属引用解析（并发查询 + 纯函数解析）
    /// 5. 按文件顺序逐行落库（每行一个事务）
    /// 6. 汇总报告
    async fn import_rows(&self, rows: Vec<ImportRow>, cancel: &ImportCancellation)
        -> ImportReport;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解码（表格 → 行）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为有序行（携带表格行号，表头为第 1 行）
    ///
    /// # 返回
    /// - Ok(Vec<ImportRow>): 非空白行，按文件顺序
    /// - Err: 文件读取错误、格式错误
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<ImportRow>>;
}

// ==========================================
// RowNormalizer Trait
// ==========================================
// 用途: 原始行 → 候选记录
// 实现者: RowNormalizerImpl
pub trait RowNormalizer: Send + Sync {
    /// 规范化单行
    ///
    /// # 返回
    /// - Ok(CandidateRecord): 字段已 trim、已类型化
    /// - Err: 缺列、必填为空、日期/数字格式错误（对应 ParseFailed）
    fn normalize(&self, row: &ImportRow) -> ImportResult<CandidateRecord>;
}

// ==========================================
// RecordValidator Trait
// ==========================================
// 用途: 字段级与记录级规则校验
// 实现者: RecordValidatorImpl
pub trait RecordValidator: Send + Sync {
    /// 校验候选记录
    ///
    /// # 返回
    /// - Ok(CandidateRecord): 新的、已 trim 的记录
    /// - Err(Vec<ValidationIssue>): 非空、按规则优先级排序
    fn validate(
        &self,
        candidate: CandidateRecord,
        ctx: &ValidationContext<'_>,
    ) -> Result<CandidateRecord, Vec<ValidationIssue>>;
}

// ==========================================
// FamilyResolver Trait
// ==========================================
// 用途: 亲属引用解析（批内 + 已持久化）
// 实现者: FamilyResolverImpl
pub trait FamilyResolver: Send + Sync {
    /// 解析一批已校验记录的亲属引用
    ///
    /// # 参数
    /// - batch: 本批次已通过校验的记录（文件顺序）
    /// - persisted: 已持久化客户的存在性快照
    ///
    /// # 返回
    /// - 与 batch 一一对应的解析结果
    fn resolve(
        &self,
        batch: Vec<CandidateRecord>,
        persisted: &PersistedLookup,
    ) -> Vec<ResolvedCandidate>;
}
