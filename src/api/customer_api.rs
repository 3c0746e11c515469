// ==========================================
// 客户档案管理系统 - 客户 API
// ==========================================
// 职责: 单条客户记录的增删改查
// 规则:
// - 与批量导入共用同一个记录校验器
// - 创建时 NIC 已存在 → DuplicateResource；更新时改成他人 NIC → DuplicateResource
// - 亲属 ID 必须已存在，否则 NotFound
// - 响应中的亲属集合在读取时对称化
// ==========================================

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::api::dto::CustomerDto;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::customer::{CandidateRecord, CustomerId, CustomerRecord, FamilyRef};
use crate::domain::types::ValidationMode;
use crate::i18n::t_with_args;
use crate::importer::customer_importer_trait::RecordValidator;
use crate::importer::record_validator::{BatchNicSet, RecordValidatorImpl, ValidationContext};
use crate::repository::CustomerRepository;

// ==========================================
// CustomerApi - 客户 API
// ==========================================
pub struct CustomerApi {
    repo: Arc<dyn CustomerRepository>,
    validator: Box<dyn RecordValidator>,
}

impl CustomerApi {
    /// 创建新的CustomerApi实例
    ///
    /// # 参数
    /// - repo: 客户仓储
    pub fn new(repo: Arc<dyn CustomerRepository>) -> Self {
        Self {
            repo,
            validator: Box::new(RecordValidatorImpl::new()),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询单个客户
    ///
    /// # 返回
    /// - Ok(CustomerDto): 客户信息（亲属集合已对称化）
    /// - Err(ApiError::NotFound): 客户不存在
    pub async fn get_customer(&self, id: CustomerId) -> ApiResult<CustomerDto> {
        let record = self.repo.get(id).await?;
        self.to_dto(record).await
    }

    /// 查询全部客户（按 ID 升序）
    pub async fn list_customers(&self) -> ApiResult<Vec<CustomerDto>> {
        let records = self.repo.list().await?;
        debug!(count = records.len(), "查询客户列表");

        let mut customers = Vec::with_capacity(records.len());
        for record in records {
            customers.push(self.to_dto(record).await?);
        }
        Ok(customers)
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 创建客户
    ///
    /// # 返回
    /// - Ok(CustomerDto): 创建后的客户
    /// - Err(ApiError::ValidationFailed): 字段校验失败
    /// - Err(ApiError::DuplicateResource): NIC 已存在
    /// - Err(ApiError::NotFound): 亲属 ID 不存在
    #[instrument(skip(self, dto), fields(nic = %dto.nic))]
    pub async fn create_customer(&self, dto: CustomerDto) -> ApiResult<CustomerDto> {
        let candidate = self.validate(dto.into_candidate(None))?;

        if self.repo.exists_by_nic(&candidate.nic).await? {
            return Err(ApiError::DuplicateResource(t_with_args(
                "api.nic_exists",
                &[("nic", &candidate.nic)],
            )));
        }
        let family = self.check_family(&candidate).await?;

        let id = self.repo.create(&candidate.into_customer(family)).await?;
        info!(customer_id = id, "客户已创建");
        self.get_customer(id).await
    }

    /// 更新客户（整体替换地址、手机号与本客户列出的亲属）
    ///
    /// # 返回
    /// - Err(ApiError::NotFound): 客户或亲属不存在
    /// - Err(ApiError::DuplicateResource): 新 NIC 属于其他客户
    #[instrument(skip(self, dto), fields(nic = %dto.nic))]
    pub async fn update_customer(&self, id: CustomerId, dto: CustomerDto) -> ApiResult<CustomerDto> {
        // 确认存在
        self.repo.get(id).await?;

        let candidate = self.validate(dto.into_candidate(Some(id)))?;

        if let Some(owner) = self.repo.find_id_by_nic(&candidate.nic).await? {
            if owner != id {
                return Err(ApiError::DuplicateResource(t_with_args(
                    "api.nic_taken",
                    &[("nic", &candidate.nic), ("owner", &owner.to_string())],
                )));
            }
        }
        let family = self.check_family(&candidate).await?;

        self.repo.update(id, &candidate.into_customer(family)).await?;
        info!(customer_id = id, "客户已更新");
        self.get_customer(id).await
    }

    /// 删除客户（地址、手机号、双向亲属边一并删除）
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> ApiResult<()> {
        self.repo.delete(id).await?;
        info!(customer_id = id, "客户已删除");
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn validate(&self, candidate: CandidateRecord) -> ApiResult<CandidateRecord> {
        // 单条请求不存在批内 NIC；NIC 唯一性由调用方单独检查
        let seen = BatchNicSet::new();
        let persisted = HashSet::new();
        let ctx = ValidationContext {
            today: chrono::Local::now().date_naive(),
            mode: ValidationMode::CollectAll,
            seen_nics: &seen,
            persisted_nics: &persisted,
        };
        self.validator
            .validate(candidate, &ctx)
            .map_err(ApiError::ValidationFailed)
    }

    async fn check_family(&self, candidate: &CandidateRecord) -> ApiResult<BTreeSet<CustomerId>> {
        let mut family = BTreeSet::new();
        for reference in &candidate.family_refs {
            if let FamilyRef::Id(id) = reference {
                if !self.repo.exists(*id).await? {
                    return Err(ApiError::NotFound(t_with_args(
                        "api.family_not_found",
                        &[("id", &id.to_string())],
                    )));
                }
                family.insert(*id);
            }
        }
        Ok(family)
    }

    async fn to_dto(&self, record: CustomerRecord) -> ApiResult<CustomerDto> {
        let listed_by = match record.id {
            Some(id) => self.repo.listed_by(id).await?,
            None => Vec::new(),
        };
        let family = record.symmetric_family(&listed_by);
        Ok(CustomerDto::from_record(record, family))
    }
}
