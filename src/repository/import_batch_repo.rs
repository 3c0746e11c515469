// ==========================================
// 客户档案管理系统 - 导入批次 Repository
// ==========================================
// 职责: import_batch 表的写入与查询（批次审计）
// ==========================================

use crate::domain::import::ImportBatch;
use crate::domain::types::ImportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportBatchRepository
// ==========================================
pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 Repository（共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入导入批次记录
    pub fn insert(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, status,
                total_records, success_count, failure_count,
                message, imported_at, elapsed_ms, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.status.to_db_str(),
                batch.total_records as i64,
                batch.success_count as i64,
                batch.failure_count as i64,
                batch.message,
                batch.imported_at.to_rfc3339(),
                batch.elapsed_ms as i64,
                batch.report_json,
            ],
        )?;

        Ok(())
    }

    /// 查询最近的导入批次（按导入时间倒序）
    pub fn recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, file_name, status,
                   total_records, success_count, failure_count,
                   message, imported_at, elapsed_ms, report_json
            FROM import_batch
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;

        let batches = stmt
            .query_map(params![limit as i64], |row| {
                let imported_at: String = row.get(7)?;
                Ok(ImportBatch {
                    batch_id: row.get(0)?,
                    file_name: row.get(1)?,
                    status: ImportStatus::from_db_str(&row.get::<_, String>(2)?),
                    total_records: row.get::<_, i64>(3)? as usize,
                    success_count: row.get::<_, i64>(4)? as usize,
                    failure_count: row.get::<_, i64>(5)? as usize,
                    message: row.get(6)?,
                    imported_at: chrono::DateTime::parse_from_rfc3339(&imported_at)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                    elapsed_ms: row.get::<_, i64>(8)? as u64,
                    report_json: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::ImportReport;

    #[test]
    fn test_insert_and_recent() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = ImportBatchRepository::from_connection(Arc::new(Mutex::new(conn)));

        let report = ImportReport::from_rows(
            "batch-1".to_string(),
            ImportStatus::Completed,
            vec![],
            Some("ok".to_string()),
            12,
        );
        repo.insert(&ImportBatch::from_report(&report, Some("customers.csv".to_string())))
            .unwrap();

        let batches = repo.recent(10).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_id, "batch-1");
        assert_eq!(batches[0].status, ImportStatus::Completed);
        assert_eq!(batches[0].file_name.as_deref(), Some("customers.csv"));
        assert!(batches[0].report_json.is_some());
    }
}
