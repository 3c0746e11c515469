// ==========================================
// 客户档案管理系统 - 批量导入领域模型
// ==========================================
// 职责: 导入行、行结果、引用解析结果、导入报告、导入批次
// 红线: successCount + failureCount == totalRecords，每行恰好一个结果
// ==========================================

use crate::domain::customer::{CandidateRecord, CustomerId, FamilyRef};
use crate::domain::types::{ImportStatus, ValidationRule, WarningKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ImportRow - 上传表格中的一行
// ==========================================
// 生命周期: 仅在一次导入运行内
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub row_number: usize,             // 表格行号（表头为第 1 行）
    pub cells: HashMap<String, String>, // 列名 → 原始单元格文本
    /// 无法解码的列（非 UTF-8 等）；存在时该行在规范化阶段失败
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreadable_column: Option<String>,
}

impl ImportRow {
    pub fn new(row_number: usize, cells: HashMap<String, String>) -> Self {
        Self {
            row_number,
            cells,
            unreadable_column: None,
        }
    }

    /// 结构上无法读取的行（仍占用行号，按行级解析失败处理）
    pub fn unreadable(row_number: usize, column: impl Into<String>) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
            unreadable_column: Some(column.into()),
        }
    }
}

// ==========================================
// ValidationIssue - 字段级校验问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field: String,
    pub rule: ValidationRule,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &str, rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule,
            message: message.into(),
        }
    }
}

// ==========================================
// ImportWarning - 行级警告（不影响成功）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub reference: String,
    pub message: String,
}

// ==========================================
// RowOutcome - 单行处理的终态分类
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RowOutcome {
    Succeeded {
        customer_id: CustomerId,
        warnings: Vec<ImportWarning>,
    },
    ValidationFailed {
        errors: Vec<ValidationIssue>,
    },
    ParseFailed {
        reason: String,
    },
    Skipped {
        reason: String,
    },
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Succeeded { .. })
    }

    /// 是否因 NIC 重复而失败
    pub fn is_duplicate_nic_failure(&self) -> bool {
        match self {
            RowOutcome::ValidationFailed { errors } => {
                errors.iter().any(|e| e.rule.is_duplicate_nic())
            }
            _ => false,
        }
    }

    /// 失败原因摘要（用于报告 message）
    pub fn failure_summary(&self) -> Option<String> {
        match self {
            RowOutcome::Succeeded { .. } => None,
            RowOutcome::ValidationFailed { errors } => Some(
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            RowOutcome::ParseFailed { reason } | RowOutcome::Skipped { reason } => {
                Some(reason.clone())
            }
        }
    }
}

// ==========================================
// RowReport - 报告中的单行明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowReport {
    pub row_number: usize,
    pub nic: Option<String>,
    pub outcome: RowOutcome,
}

// ==========================================
// 亲属引用解析结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "target", rename_all = "camelCase")]
pub enum ReferenceStatus {
    ResolvedExisting(CustomerId), // 目标已在 Repository 中
    ResolvedInBatch(usize),       // 目标为同批次的另一行（行号）
    Dangling,                     // 目标不存在
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReference {
    pub reference: FamilyRef,
    pub status: ReferenceStatus,
}

/// 解析后的候选记录（携带逐条引用状态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub candidate: CandidateRecord,
    pub references: Vec<ResolvedReference>,
}

impl ResolvedCandidate {
    pub fn existing_targets(&self) -> impl Iterator<Item = CustomerId> + '_ {
        self.references.iter().filter_map(|r| match r.status {
            ReferenceStatus::ResolvedExisting(id) => Some(id),
            _ => None,
        })
    }

    pub fn in_batch_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.references.iter().filter_map(|r| match r.status {
            ReferenceStatus::ResolvedInBatch(row) => Some(row),
            _ => None,
        })
    }

    pub fn dangling(&self) -> impl Iterator<Item = &FamilyRef> + '_ {
        self.references
            .iter()
            .filter(|r| r.status == ReferenceStatus::Dangling)
            .map(|r| &r.reference)
    }
}

// ==========================================
// ImportReport - 导入汇总报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub batch_id: String,
    pub status: ImportStatus,
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub message: Option<String>,
    pub rows: Vec<RowReport>, // 按文件顺序
    pub elapsed_ms: u64,
}

impl ImportReport {
    /// 由行明细汇总报告（计数由行结果推导，保证不变量）
    pub fn from_rows(
        batch_id: String,
        status: ImportStatus,
        rows: Vec<RowReport>,
        message: Option<String>,
        elapsed_ms: u64,
    ) -> Self {
        let total_records = rows.len();
        let success_count = rows.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            batch_id,
            status,
            total_records,
            success_count,
            failure_count: total_records - success_count,
            message,
            rows,
            elapsed_ms,
        }
    }

    /// 失败行摘要，形如 "Row 3: ..."（最多 limit 条）
    pub fn failure_summaries(&self, limit: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| {
                r.outcome
                    .failure_summary()
                    .map(|s| format!("Row {}: {}", r.row_number, s))
            })
            .take(limit)
            .collect()
    }
}

// ==========================================
// ImportBatch - 导入批次记录
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub status: ImportStatus,
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub message: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub report_json: Option<String>,
}

impl ImportBatch {
    pub fn from_report(report: &ImportReport, file_name: Option<String>) -> Self {
        Self {
            batch_id: report.batch_id.clone(),
            file_name,
            status: report.status,
            total_records: report.total_records,
            success_count: report.success_count,
            failure_count: report.failure_count,
            message: report.message.clone(),
            imported_at: Utc::now(),
            elapsed_ms: report.elapsed_ms,
            report_json: serde_json::to_string(report).ok(),
        }
    }
}
