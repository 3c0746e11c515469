// ==========================================
// 客户档案管理系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 行级错误（唯一约束、外键、未找到）与系统性错误（存储不可达、锁失败）
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据错误（行级）=====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("唯一约束违反: {0}")]
    DuplicateKey(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("约束违反: {0}")]
    ConstraintViolation(String),

    // ===== 存储错误 =====
    #[error("存储不可达: {0}")]
    Unavailable(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否为系统性错误（与具体行无关，继续处理后续行没有意义）
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            RepositoryError::Unavailable(_) | RepositoryError::LockError(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let msg = msg.clone().unwrap_or_else(|| code.to_string());
                match code.code {
                    ErrorCode::ConstraintViolation => {
                        if msg.contains("UNIQUE") {
                            RepositoryError::DuplicateKey(msg)
                        } else if msg.contains("FOREIGN KEY") {
                            RepositoryError::ForeignKeyViolation(msg)
                        } else {
                            RepositoryError::ConstraintViolation(msg)
                        }
                    }
                    ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::DiskFull
                    | ErrorCode::ReadOnly => RepositoryError::Unavailable(msg),
                    _ => RepositoryError::DatabaseQueryError(msg),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_maps_to_duplicate_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (nic TEXT UNIQUE); INSERT INTO t VALUES ('A1');")
            .unwrap();

        let err: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('A1')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::DuplicateKey(_)));
        assert!(!err.is_systemic());
    }

    #[test]
    fn test_unavailable_is_systemic() {
        assert!(RepositoryError::Unavailable("down".to_string()).is_systemic());
        assert!(RepositoryError::LockError("poisoned".to_string()).is_systemic());
        assert!(!RepositoryError::not_found("Customer", 1).is_systemic());
    }
}
