// ==========================================
// 客户档案管理系统 - 存储守卫
// ==========================================
// 职责: 导入运行内的每次 Repository 调用统一经过此处
// 策略:
// - 每次调用强制超时（tokio::time::timeout）
// - 超时或存储不可达时最多重试 store_retries 次
// - 仍失败则 ping 探测: 探测失败 → 系统性失败；探测成功 → 仅本行失败
// - 存储明确拒绝（唯一约束、外键等）不重试，原样交给调用方
// - 创建不幂等: 超时后的写入可能已提交，先按 NIC 对账再决定是否重试
// ==========================================

use crate::domain::customer::{CustomerId, CustomerRecord};
use crate::i18n::t_with_args;
use crate::repository::{CustomerRepository, RepositoryError, RepositoryResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

// ==========================================
// StoreFailure - 守卫调用失败分类
// ==========================================
#[derive(Error, Debug)]
pub enum StoreFailure {
    /// 存储不可达（探测失败），整批中止
    #[error("{0}")]
    Systemic(String),

    /// 超时但存储仍可达，仅影响当前行
    #[error("{0}")]
    RowTimeout(String),

    /// 存储给出了明确的行级拒绝
    #[error(transparent)]
    Rejected(RepositoryError),
}

// ==========================================
// StoreGuard
// ==========================================
pub struct StoreGuard {
    repo: Arc<dyn CustomerRepository>,
    call_timeout: Duration,
    retries: u32,
}

impl StoreGuard {
    pub fn new(repo: Arc<dyn CustomerRepository>, call_timeout: Duration, retries: u32) -> Self {
        Self {
            repo,
            call_timeout,
            retries,
        }
    }

    pub fn repository(&self) -> &dyn CustomerRepository {
        self.repo.as_ref()
    }

    /// 在超时与重试保护下执行一次 Repository 调用
    ///
    /// # 参数
    /// - operation: 操作名（用于日志与失败原因）
    /// - op: 每次尝试生成一个新的调用 future
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, StoreFailure>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = RepositoryResult<T>> + Send,
    {
        let mut attempt: u32 = 0;
        let last_reason = loop {
            let reason = match timeout(self.call_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_systemic() => return Err(StoreFailure::Rejected(e)),
                Ok(Err(e)) => e.to_string(),
                Err(_) => t_with_args("import.store_timeout", &[("operation", operation)]),
            };

            if attempt >= self.retries {
                break reason;
            }
            attempt += 1;
            warn!(operation = operation, attempt = attempt, reason = %reason, "存储调用失败，重试");
        };

        Err(self.probe(operation, last_reason).await)
    }

    /// 写入一行客户（含延迟亲属边）
    ///
    /// 超时或系统性错误后，先按 NIC 查询该行是否已提交:
    /// 已提交 → 视为成功；未提交 → 按 store_retries 重试；
    /// 不确定状态下的重试遇到唯一约束冲突 → 再次对账
    ///
    /// # 返回
    /// - Ok(CustomerId): 本次或此前某次尝试提交的客户 ID
    pub async fn create_reconciled(
        &self,
        record: &CustomerRecord,
        referenced_by: &[CustomerId],
    ) -> Result<CustomerId, StoreFailure> {
        let operation = "create_with_links";
        let mut attempt: u32 = 0;
        let mut uncertain = false;
        let last_reason = loop {
            let reason = match timeout(
                self.call_timeout,
                self.repo.create_with_links(record, referenced_by),
            )
            .await
            {
                Ok(Ok(id)) => return Ok(id),
                Ok(Err(RepositoryError::DuplicateKey(key))) if uncertain => {
                    return match self.committed_id(&record.nic).await {
                        Some(id) => {
                            info!(nic = %record.nic, customer_id = id, "重试冲突，前次写入已提交");
                            Ok(id)
                        }
                        None => Err(StoreFailure::Rejected(RepositoryError::DuplicateKey(key))),
                    };
                }
                Ok(Err(e)) if !e.is_systemic() => return Err(StoreFailure::Rejected(e)),
                Ok(Err(e)) => e.to_string(),
                Err(_) => t_with_args("import.store_timeout", &[("operation", operation)]),
            };

            uncertain = true;
            if let Some(id) = self.committed_id(&record.nic).await {
                info!(nic = %record.nic, customer_id = id, "写入结果未知，对账确认已提交");
                return Ok(id);
            }

            if attempt >= self.retries {
                break reason;
            }
            attempt += 1;
            warn!(operation = operation, attempt = attempt, reason = %reason, "写入未提交，重试");
        };

        Err(self.probe(operation, last_reason).await)
    }

    /// 按 NIC 查询已提交的客户 ID；查询本身失败时返回 None
    async fn committed_id(&self, nic: &str) -> Option<CustomerId> {
        match timeout(self.call_timeout, self.repo.find_id_by_nic(nic)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(nic = nic, error = %e, "对账查询失败");
                None
            }
            Err(_) => {
                warn!(nic = nic, "对账查询超时");
                None
            }
        }
    }

    /// 重试耗尽: 探测存储是否仍可达，决定行级或系统性失败
    async fn probe(&self, operation: &str, last_reason: String) -> StoreFailure {
        match timeout(self.call_timeout, self.repo.ping()).await {
            Ok(Ok(())) => {
                warn!(operation = operation, reason = %last_reason, "存储可达，按行级失败处理");
                StoreFailure::RowTimeout(last_reason)
            }
            Ok(Err(e)) => {
                error!(operation = operation, error = %e, "存储探测失败");
                StoreFailure::Systemic(t_with_args(
                    "import.store_unreachable",
                    &[("reason", &e.to_string())],
                ))
            }
            Err(_) => {
                error!(operation = operation, "存储探测超时");
                StoreFailure::Systemic(t_with_args(
                    "import.store_unreachable",
                    &[("reason", &last_reason)],
                ))
            }
        }
    }

    /// 导入前的可达性预检；任何失败均视为系统性失败
    pub async fn preflight(&self) -> Result<(), StoreFailure> {
        match self.call("ping", || self.repo.ping()).await {
            Ok(()) | Err(StoreFailure::RowTimeout(_)) => Ok(()),
            Err(StoreFailure::Rejected(e)) => Err(StoreFailure::Systemic(t_with_args(
                "import.store_unreachable",
                &[("reason", &e.to_string())],
            ))),
            Err(systemic) => Err(systemic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 前 slow_calls 次 exists / create 调用挂起，ping 可配置
    /// committed: 已落库的客户 ID（模拟提交后应答丢失），前 hidden_finds 次查询不可见
    struct FlakyRepo {
        calls: AtomicUsize,
        creates: AtomicUsize,
        finds: AtomicUsize,
        slow_calls: usize,
        ping_ok: bool,
        committed: Option<CustomerId>,
        hidden_finds: usize,
    }

    #[async_trait]
    impl CustomerRepository for FlakyRepo {
        async fn create_with_links(
            &self,
            _record: &CustomerRecord,
            _referenced_by: &[CustomerId],
        ) -> RepositoryResult<CustomerId> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            if n < self.slow_calls {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Err(RepositoryError::DuplicateKey("uk_customer_nic".to_string()))
        }
        async fn update(&self, _id: CustomerId, _record: &CustomerRecord) -> RepositoryResult<()> {
            Ok(())
        }
        async fn delete(&self, _id: CustomerId) -> RepositoryResult<()> {
            Ok(())
        }
        async fn find_id_by_nic(&self, _nic: &str) -> RepositoryResult<Option<CustomerId>> {
            if self.finds.fetch_add(1, Ordering::SeqCst) < self.hidden_finds {
                return Ok(None);
            }
            Ok(self.committed)
        }
        async fn exists(&self, _id: CustomerId) -> RepositoryResult<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.slow_calls {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(true)
        }
        async fn get(&self, id: CustomerId) -> RepositoryResult<CustomerRecord> {
            Err(RepositoryError::not_found("Customer", id))
        }
        async fn list(&self) -> RepositoryResult<Vec<CustomerRecord>> {
            Ok(vec![])
        }
        async fn listed_by(&self, _id: CustomerId) -> RepositoryResult<Vec<CustomerId>> {
            Ok(vec![])
        }
        async fn ping(&self) -> RepositoryResult<()> {
            if self.ping_ok {
                Ok(())
            } else {
                Err(RepositoryError::Unavailable("connection refused".to_string()))
            }
        }
    }

    fn guard(slow_calls: usize, ping_ok: bool) -> (StoreGuard, Arc<FlakyRepo>) {
        guard_with_commit(slow_calls, ping_ok, None, 0)
    }

    fn guard_with_commit(
        slow_calls: usize,
        ping_ok: bool,
        committed: Option<CustomerId>,
        hidden_finds: usize,
    ) -> (StoreGuard, Arc<FlakyRepo>) {
        let repo = Arc::new(FlakyRepo {
            calls: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            finds: AtomicUsize::new(0),
            slow_calls,
            ping_ok,
            committed,
            hidden_finds,
        });
        (
            StoreGuard::new(repo.clone(), Duration::from_millis(20), 1),
            repo,
        )
    }

    #[tokio::test]
    async fn test_single_timeout_is_retried() {
        let (guard, repo) = guard(1, true);
        let result = guard.call("exists", || guard.repository().exists(1)).await;
        assert!(result.unwrap());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_timeout_with_reachable_store_is_row_level() {
        let (guard, _repo) = guard(5, true);
        let result = guard.call("exists", || guard.repository().exists(1)).await;
        assert!(matches!(result, Err(StoreFailure::RowTimeout(_))));
    }

    #[tokio::test]
    async fn test_repeated_timeout_with_unreachable_store_is_systemic() {
        let (guard, _repo) = guard(5, false);
        let result = guard.call("exists", || guard.repository().exists(1)).await;
        assert!(matches!(result, Err(StoreFailure::Systemic(_))));
        assert!(guard.preflight().await.is_err());
    }

    fn alice() -> CustomerRecord {
        CustomerRecord {
            id: None,
            name: "Alice".to_string(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            nic: "A1".to_string(),
            mobile_numbers: vec![],
            addresses: vec![],
            family_member_ids: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_timed_out_create_that_committed_is_success() {
        let (guard, repo) = guard_with_commit(5, true, Some(9), 0);
        let result = guard.create_reconciled(&alice(), &[]).await;
        assert_eq!(result.unwrap(), 9);
        // 已对账确认提交，不再重试写入
        assert_eq!(repo.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_after_timeout_reconciles_to_committed_row() {
        // 首次超时后对账尚不可见，重试命中唯一约束，再次对账找到前次提交
        let (guard, repo) = guard_with_commit(1, true, Some(9), 1);
        let result = guard.create_reconciled(&alice(), &[]).await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(repo.creates.load(Ordering::SeqCst), 2);
        assert_eq!(repo.finds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_uncommitted_create_times_out_as_row_failure() {
        let (guard, repo) = guard_with_commit(5, true, None, 0);
        let result = guard.create_reconciled(&alice(), &[]).await;
        assert!(matches!(result, Err(StoreFailure::RowTimeout(_))));
        assert_eq!(repo.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let (guard, repo) = guard(0, true);
        let record = alice();
        let result = guard
            .call("create", || guard.repository().create(&record))
            .await;
        assert!(matches!(
            result,
            Err(StoreFailure::Rejected(RepositoryError::DuplicateKey(_)))
        ));

        let result = guard.create_reconciled(&record, &[]).await;
        assert!(matches!(
            result,
            Err(StoreFailure::Rejected(RepositoryError::DuplicateKey(_)))
        ));
        assert_eq!(repo.creates.load(Ordering::SeqCst), 2);
    }
}
