// ==========================================
// 客户档案管理系统 - 客户 Repository Trait
// ==========================================
// 职责: 定义客户数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD；NIC 唯一性由存储层最终裁决
// ==========================================

use crate::domain::customer::{CustomerId, CustomerRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CustomerRepository Trait
// ==========================================
// 用途: 客户主记录及其子记录（手机号、地址、亲属边）的持久化
// 实现者: SqliteCustomerRepository（使用 rusqlite）
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    // ===== 写入（每次调用一个原子事务）=====

    /// 创建客户（含手机号、地址、本记录列出的亲属边）
    ///
    /// # 返回
    /// - Ok(CustomerId): 新分配的客户 ID
    /// - Err(DuplicateKey): NIC 已存在
    /// - Err(Unavailable): 存储不可达
    async fn create(&self, record: &CustomerRecord) -> RepositoryResult<CustomerId> {
        self.create_with_links(record, &[]).await
    }

    /// 创建客户，并在同一事务中写入指向本客户的亲属边
    ///
    /// # 参数
    /// - record: 待创建的客户；family_member_ids 为本记录列出的亲属（出边）
    /// - referenced_by: 已持久化、且列出本客户的其他客户 ID（入边）
    async fn create_with_links(
        &self,
        record: &CustomerRecord,
        referenced_by: &[CustomerId],
    ) -> RepositoryResult<CustomerId>;

    /// 整体更新客户（子记录与出边全部替换）
    ///
    /// # 返回
    /// - Err(NotFound): 客户不存在
    /// - Err(DuplicateKey): 新 NIC 与其他客户冲突
    async fn update(&self, id: CustomerId, record: &CustomerRecord) -> RepositoryResult<()>;

    /// 删除客户（子记录与相关亲属边级联删除）
    async fn delete(&self, id: CustomerId) -> RepositoryResult<()>;

    // ===== 查询 =====

    /// NIC 是否已存在
    async fn exists_by_nic(&self, nic: &str) -> RepositoryResult<bool> {
        Ok(self.find_id_by_nic(nic).await?.is_some())
    }

    /// 按 NIC 查询客户 ID
    async fn find_id_by_nic(&self, nic: &str) -> RepositoryResult<Option<CustomerId>>;

    /// 客户 ID 是否存在
    async fn exists(&self, id: CustomerId) -> RepositoryResult<bool>;

    /// 按 ID 读取客户
    ///
    /// # 返回
    /// - Err(NotFound): 客户不存在
    async fn get(&self, id: CustomerId) -> RepositoryResult<CustomerRecord>;

    /// 列出全部客户（按 ID 升序）
    async fn list(&self) -> RepositoryResult<Vec<CustomerRecord>>;

    /// 查询在亲属列表中列出了指定客户的其他客户（入边来源）
    async fn listed_by(&self, id: CustomerId) -> RepositoryResult<Vec<CustomerId>>;

    // ===== 健康检查 =====

    /// 探测存储是否可达
    async fn ping(&self) -> RepositoryResult<()>;
}
