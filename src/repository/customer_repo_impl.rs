// ==========================================
// 客户档案管理系统 - 客户 Repository 实现
// ==========================================
// 职责: 实现客户数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 说明: SQLite 调用为阻塞 IO，统一放到 tokio 阻塞线程池执行，
//       使上层的超时控制真实有效
// ==========================================

use crate::domain::customer::{Address, CustomerId, CustomerRecord};
use crate::repository::customer_repo::CustomerRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// SqliteCustomerRepository
// ==========================================
pub struct SqliteCustomerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCustomerRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
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

    /// 在阻塞线程池中持锁执行数据库操作
    async fn run_blocking<T, F>(&self, op: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(format!("阻塞任务执行失败: {}", e)))?
    }

    // ===== 事务内辅助函数 =====

    /// 写入手机号与地址子记录（按录入顺序编号）
    fn insert_children_tx(
        tx: &Transaction,
        customer_id: CustomerId,
        record: &CustomerRecord,
    ) -> RepositoryResult<()> {
        {
            let mut stmt = tx.prepare(
                "INSERT INTO mobile_numbers (customer_id, seq_no, number) VALUES (?1, ?2, ?3)",
            )?;
            for (seq_no, number) in record.mobile_numbers.iter().enumerate() {
                stmt.execute(params![customer_id, seq_no as i64, number])?;
            }
        }

        let mut stmt = tx.prepare(
            r#"
            INSERT INTO addresses (
                customer_id, seq_no, address_line1, address_line2, city_id, country_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for (seq_no, address) in record.addresses.iter().enumerate() {
            stmt.execute(params![
                customer_id,
                seq_no as i64,
                address.address_line1,
                address.address_line2,
                address.city_id,
                address.country_id,
            ])?;
        }

        Ok(())
    }

    /// 写入有向亲属边（重复边忽略）
    fn insert_edges_tx(
        tx: &Transaction,
        edges: impl Iterator<Item = (CustomerId, CustomerId)>,
    ) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO customer_family_members (customer_id, family_member_id)
             VALUES (?1, ?2)",
        )?;
        for (from, to) in edges {
            stmt.execute(params![from, to])?;
        }
        Ok(())
    }

    /// 读取单个客户（含子记录）；不存在返回 None
    fn load_customer(conn: &Connection, id: CustomerId) -> RepositoryResult<Option<CustomerRecord>> {
        let head = conn
            .query_row(
                "SELECT id, name, date_of_birth, nic FROM customers WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, CustomerId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, NaiveDate>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let (id, name, date_of_birth, nic) = match head {
            Some(h) => h,
            None => return Ok(None),
        };

        let mobile_numbers = {
            let mut stmt = conn.prepare(
                "SELECT number FROM mobile_numbers WHERE customer_id = ?1 ORDER BY seq_no",
            )?;
            let rows = stmt
                .query_map(params![id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let addresses = {
            let mut stmt = conn.prepare(
                r#"
                SELECT address_line1, address_line2, city_id, country_id
                FROM addresses
                WHERE customer_id = ?1
                ORDER BY seq_no
                "#,
            )?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok(Address {
                        address_line1: row.get(0)?,
                        address_line2: row.get(1)?,
                        city_id: row.get(2)?,
                        country_id: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let family_member_ids = {
            let mut stmt = conn.prepare(
                "SELECT family_member_id FROM customer_family_members WHERE customer_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![id], |row| row.get::<_, CustomerId>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            rows
        };

        Ok(Some(CustomerRecord {
            id: Some(id),
            name,
            date_of_birth,
            nic,
            mobile_numbers,
            addresses,
            family_member_ids,
        }))
    }
}

#[async_trait]
impl CustomerRepository for SqliteCustomerRepository {
    async fn create_with_links(
        &self,
        record: &CustomerRecord,
        referenced_by: &[CustomerId],
    ) -> RepositoryResult<CustomerId> {
        let record = record.clone();
        let referenced_by = referenced_by.to_vec();

        self.run_blocking(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            let now = Utc::now().to_rfc3339();

            tx.execute(
                r#"
                INSERT INTO customers (name, date_of_birth, nic, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                "#,
                params![record.name, record.date_of_birth, record.nic, now],
            )?;
            let id = tx.last_insert_rowid();

            Self::insert_children_tx(&tx, id, &record)?;
            Self::insert_edges_tx(
                &tx,
                record
                    .family_member_ids
                    .iter()
                    .map(|&target| (id, target))
                    .chain(referenced_by.iter().map(|&source| (source, id))),
            )?;

            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

            debug!(
                customer_id = id,
                nic = %record.nic,
                outgoing = record.family_member_ids.len(),
                incoming = referenced_by.len(),
                "客户已创建"
            );
            Ok(id)
        })
        .await
    }

    async fn update(&self, id: CustomerId, record: &CustomerRecord) -> RepositoryResult<()> {
        let record = record.clone();

        self.run_blocking(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

            let affected = tx.execute(
                r#"
                UPDATE customers
                SET name = ?1, date_of_birth = ?2, nic = ?3, updated_at = ?4
                WHERE id = ?5
                "#,
                params![
                    record.name,
                    record.date_of_birth,
                    record.nic,
                    Utc::now().to_rfc3339(),
                    id
                ],
            )?;
            if affected == 0 {
                return Err(RepositoryError::not_found("Customer", id));
            }

            tx.execute("DELETE FROM mobile_numbers WHERE customer_id = ?1", params![id])?;
            tx.execute("DELETE FROM addresses WHERE customer_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM customer_family_members WHERE customer_id = ?1",
                params![id],
            )?;

            Self::insert_children_tx(&tx, id, &record)?;
            Self::insert_edges_tx(
                &tx,
                record.family_member_ids.iter().map(|&target| (id, target)),
            )?;

            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: CustomerId) -> RepositoryResult<()> {
        self.run_blocking(move |conn| {
            let affected = conn.execute("DELETE FROM customers WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(RepositoryError::not_found("Customer", id));
            }
            Ok(())
        })
        .await
    }

    async fn find_id_by_nic(&self, nic: &str) -> RepositoryResult<Option<CustomerId>> {
        let nic = nic.to_string();
        self.run_blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM customers WHERE nic = ?1",
                    params![nic],
                    |row| row.get::<_, CustomerId>(0),
                )
                .optional()?)
        })
        .await
    }

    async fn exists(&self, id: CustomerId) -> RepositoryResult<bool> {
        self.run_blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM customers WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn get(&self, id: CustomerId) -> RepositoryResult<CustomerRecord> {
        self.run_blocking(move |conn| {
            Self::load_customer(conn, id)?.ok_or_else(|| RepositoryError::not_found("Customer", id))
        })
        .await
    }

    async fn list(&self) -> RepositoryResult<Vec<CustomerRecord>> {
        self.run_blocking(|conn| {
            let ids = {
                let mut stmt = conn.prepare("SELECT id FROM customers ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, CustomerId>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            };

            let mut customers = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(customer) = Self::load_customer(conn, id)? {
                    customers.push(customer);
                }
            }
            Ok(customers)
        })
        .await
    }

    async fn listed_by(&self, id: CustomerId) -> RepositoryResult<Vec<CustomerId>> {
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT customer_id FROM customer_family_members
                WHERE family_member_id = ?1
                ORDER BY customer_id
                "#,
            )?;
            let ids = stmt
                .query_map(params![id], |row| row.get::<_, CustomerId>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.run_blocking(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }
}
