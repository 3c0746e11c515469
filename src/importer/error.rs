// ==========================================
// 客户档案管理系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级解析错误最终折叠为 RowOutcome::ParseFailed，
//       文件级错误导致整批拒绝
// ==========================================

use crate::i18n::{t, t_with_args};
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误（整批拒绝）=====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 文件无工作表")]
    NoWorksheet,

    // ===== 行级解析错误 =====
    #[error("缺少必填列: {column}")]
    MissingColumn { column: String },

    #[error("必填字段为空: {field}")]
    EmptyField { field: String },

    #[error("日期格式错误 (字段 {field}): 期望 YYYY-MM-DD，实际 {value}")]
    DateFormatError { field: String, value: String },

    #[error("整数格式错误 (字段 {field}): {value}")]
    IntegerFormatError { field: String, value: String },

    #[error("行无法读取 (列 {column}): 非 UTF-8 编码")]
    UnreadableRow { column: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为文件级错误（整批无法解码）
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::NoWorksheet
        )
    }

    /// 面向用户的本地化描述（写入报告）；日志仍使用 Display
    pub fn localized(&self) -> String {
        match self {
            ImportError::FileNotFound(path) => {
                t_with_args("import.file_not_found", &[("path", path)])
            }
            ImportError::UnsupportedFormat(ext) => {
                t_with_args("import.unsupported_format", &[("ext", ext)])
            }
            ImportError::FileReadError(reason)
            | ImportError::ExcelParseError(reason)
            | ImportError::CsvParseError(reason)
            | ImportError::InternalError(reason) => {
                t_with_args("import.file_unreadable", &[("reason", reason)])
            }
            ImportError::NoWorksheet => t("parse.no_worksheet"),
            ImportError::MissingColumn { column } => {
                t_with_args("parse.missing_column", &[("column", column)])
            }
            ImportError::EmptyField { field } => {
                t_with_args("parse.empty_field", &[("field", field)])
            }
            ImportError::DateFormatError { field, value } => t_with_args(
                "parse.bad_date",
                &[("field", field), ("value", value)],
            ),
            ImportError::IntegerFormatError { field, value } => t_with_args(
                "parse.bad_integer",
                &[("field", field), ("value", value)],
            ),
            ImportError::UnreadableRow { column } => {
                t_with_args("parse.unreadable_row", &[("column", column)])
            }
            ImportError::Other(e) => {
                t_with_args("import.file_unreadable", &[("reason", &e.to_string())])
            }
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_messages_resolve_locale_keys() {
        let errors = [
            ImportError::NoWorksheet,
            ImportError::MissingColumn {
                column: "NIC".to_string(),
            },
            ImportError::IntegerFormatError {
                field: "City ID".to_string(),
                value: "Colombo".to_string(),
            },
            ImportError::UnreadableRow {
                column: "Name".to_string(),
            },
            ImportError::CsvParseError("bad quote".to_string()),
        ];

        for err in &errors {
            let text = err.localized();
            // 未命中的 key 会以 key 路径形式返回
            assert!(!text.contains("parse."), "{}", text);
            assert!(!text.contains("import."), "{}", text);
        }
        assert!(errors[1].localized().contains("NIC"));
        assert!(errors[2].localized().contains("Colombo"));
        assert!(errors[4].localized().contains("bad quote"));
    }

    #[test]
    fn test_file_level_classification() {
        assert!(ImportError::NoWorksheet.is_file_level());
        assert!(!ImportError::UnreadableRow {
            column: "Name".to_string()
        }
        .is_file_level());
    }
}
