// ==========================================
// 故障注入客户仓储
// ==========================================
// 职责: 包装真实仓储，按配置注入行级拒绝、调用挂起、提交后应答丢失、
//       存储宕机、落库中途取消
// ==========================================

use async_trait::async_trait;
use customer_registry::domain::{CustomerId, CustomerRecord};
use customer_registry::importer::ImportCancellation;
use customer_registry::repository::{CustomerRepository, RepositoryError, RepositoryResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct FaultyRepository {
    inner: Arc<dyn CustomerRepository>,
    /// create 时返回约束违反的 NIC
    reject_nics: HashSet<String>,
    /// create 时返回唯一约束冲突的 NIC（模拟并发写入抢先）
    duplicate_nics: HashSet<String>,
    /// create 时挂起（触发超时）的 NIC
    hang_nics: HashSet<String>,
    /// create 已提交但应答挂起的 NIC
    late_ack_nics: HashSet<String>,
    /// 成功创建 N 条后存储宕机
    down_after_creates: Option<usize>,
    /// 成功创建 N 条后请求取消
    cancel_after: Option<(usize, ImportCancellation)>,
    creates: AtomicUsize,
    down: AtomicBool,
}

impl FaultyRepository {
    pub fn new(inner: Arc<dyn CustomerRepository>) -> Self {
        Self {
            inner,
            reject_nics: HashSet::new(),
            duplicate_nics: HashSet::new(),
            hang_nics: HashSet::new(),
            late_ack_nics: HashSet::new(),
            down_after_creates: None,
            cancel_after: None,
            creates: AtomicUsize::new(0),
            down: AtomicBool::new(false),
        }
    }

    pub fn reject_nic(mut self, nic: &str) -> Self {
        self.reject_nics.insert(nic.to_string());
        self
    }

    pub fn duplicate_on_nic(mut self, nic: &str) -> Self {
        self.duplicate_nics.insert(nic.to_string());
        self
    }

    pub fn hang_on_nic(mut self, nic: &str) -> Self {
        self.hang_nics.insert(nic.to_string());
        self
    }

    pub fn ack_late_on_nic(mut self, nic: &str) -> Self {
        self.late_ack_nics.insert(nic.to_string());
        self
    }

    pub fn cancel_after_creates(mut self, n: usize, cancel: ImportCancellation) -> Self {
        self.cancel_after = Some((n, cancel));
        self
    }

    pub fn down_after_creates(mut self, n: usize) -> Self {
        self.down_after_creates = Some(n);
        self
    }

    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> RepositoryResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for FaultyRepository {
    async fn create_with_links(
        &self,
        record: &CustomerRecord,
        referenced_by: &[CustomerId],
    ) -> RepositoryResult<CustomerId> {
        self.check_up()?;
        if self.hang_nics.contains(&record.nic) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.reject_nics.contains(&record.nic) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "CHECK constraint failed: {}",
                record.nic
            )));
        }
        if self.duplicate_nics.contains(&record.nic) {
            return Err(RepositoryError::DuplicateKey(
                "UNIQUE constraint failed: customers.nic".to_string(),
            ));
        }

        let id = self.inner.create_with_links(record, referenced_by).await?;
        let done = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.down_after_creates == Some(done) {
            self.go_down();
        }
        if let Some((n, cancel)) = &self.cancel_after {
            if *n == done {
                cancel.cancel();
            }
        }
        if self.late_ack_nics.contains(&record.nic) {
            // 事务已提交，调用方超时后看不到返回值
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(id)
    }

    async fn update(&self, id: CustomerId, record: &CustomerRecord) -> RepositoryResult<()> {
        self.check_up()?;
        self.inner.update(id, record).await
    }

    async fn delete(&self, id: CustomerId) -> RepositoryResult<()> {
        self.check_up()?;
        self.inner.delete(id).await
    }

    async fn find_id_by_nic(&self, nic: &str) -> RepositoryResult<Option<CustomerId>> {
        self.check_up()?;
        self.inner.find_id_by_nic(nic).await
    }

    async fn exists(&self, id: CustomerId) -> RepositoryResult<bool> {
        self.check_up()?;
        self.inner.exists(id).await
    }

    async fn get(&self, id: CustomerId) -> RepositoryResult<CustomerRecord> {
        self.check_up()?;
        self.inner.get(id).await
    }

    async fn list(&self) -> RepositoryResult<Vec<CustomerRecord>> {
        self.check_up()?;
        self.inner.list().await
    }

    async fn listed_by(&self, id: CustomerId) -> RepositoryResult<Vec<CustomerId>> {
        self.check_up()?;
        self.inner.listed_by(id).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.check_up()?;
        self.inner.ping().await
    }
}
