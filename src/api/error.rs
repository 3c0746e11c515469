// ==========================================
// 客户档案管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/配置错误为用户友好的错误消息
// ==========================================

use crate::api::dto::BulkUploadResponse;
use crate::config::ConfigError;
use crate::domain::import::ValidationIssue;
use crate::i18n::t_with_args;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源已存在: {0}")]
    DuplicateResource(String),

    /// 单条记录校验失败（带逐字段明细）
    #[error("数据验证失败: {}", summarize(.0))]
    ValidationFailed(Vec<ValidationIssue>),

    // ==========================================
    // 导入错误
    // ==========================================
    /// 批量导入被整体拒绝（文件不可读或存储不可达），携带完整报告
    #[error("导入被拒绝: {message}")]
    ImportRejected {
        message: String,
        response: Box<BulkUploadResponse>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(t_with_args(
                "api.entity_not_found",
                &[("entity", &entity), ("id", &id)],
            ))
            }
            RepositoryError::DuplicateKey(msg) => ApiError::DuplicateResource(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::NotFound(t_with_args("api.related_not_found", &[("reason", &msg)]))
            }
            RepositoryError::ConstraintViolation(msg) => ApiError::InvalidInput(msg),
            RepositoryError::Unavailable(msg) => {
                ApiError::DatabaseError(t_with_args("import.store_unreachable", &[("reason", &msg)]))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(t_with_args("api.lock_failed", &[("reason", &msg)]))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { .. } => ApiError::InvalidInput(err.to_string()),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
