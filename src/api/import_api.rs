// ==========================================
// 客户档案管理系统 - 批量导入 API
// ==========================================
// 职责: 批量上传边界
// - 文件类型检查（.xlsx / .xls / .csv）
// - 读取导入配置快照
// - 运行导入协调器
// - 记录导入批次
// - 响应映射: 整批拒绝 → Err(ImportRejected)；部分失败 → Ok(failureCount > 0)
// ==========================================

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::dto::BulkUploadResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfig, ImportConfigReader};
use crate::domain::import::ImportBatch;
use crate::i18n::t_with_args;
use crate::importer::file_parser::{file_extension, SUPPORTED_EXTENSIONS};
use crate::importer::{BatchCoordinator, CustomerImporter, ImportCancellation};
use crate::repository::{CustomerRepository, ImportBatchRepository};

/// 导入API
pub struct ImportApi {
    customer_repo: Arc<dyn CustomerRepository>,
    batch_repo: Arc<ImportBatchRepository>,
    config_manager: Arc<ConfigManager>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    ///
    /// # 参数
    /// - customer_repo: 客户仓储
    /// - batch_repo: 导入批次仓储
    /// - config_manager: 配置管理器（读取导入配置）
    pub fn new(
        customer_repo: Arc<dyn CustomerRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            customer_repo,
            batch_repo,
            config_manager,
        }
    }

    /// 导入客户数据
    ///
    /// # 参数
    /// - file_path: 文件路径（.xlsx / .xls / .csv）
    ///
    /// # 返回
    /// - Ok(BulkUploadResponse): 导入完成（可能含失败行）
    /// - Err(ApiError::InvalidInput): 文件类型不支持或配置非法
    /// - Err(ApiError::ImportRejected): 整批拒绝，携带报告
    pub async fn import_customers(&self, file_path: &str) -> ApiResult<BulkUploadResponse> {
        self.import_customers_with_cancel(file_path, &ImportCancellation::new())
            .await
    }

    /// 导入客户数据（可取消）
    pub async fn import_customers_with_cancel(
        &self,
        file_path: &str,
        cancel: &ImportCancellation,
    ) -> ApiResult<BulkUploadResponse> {
        let config = self.config_manager.load_import_config().await?;
        self.run_import(file_path, config, cancel).await
    }

    /// 使用给定配置导入（跳过 config_kv 读取）
    pub async fn run_import(
        &self,
        file_path: &str,
        config: ImportConfig,
        cancel: &ImportCancellation,
    ) -> ApiResult<BulkUploadResponse> {
        let path = Path::new(file_path);

        // 文件类型检查
        let ext = file_extension(path);
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ApiError::InvalidInput(t_with_args(
                "import.unsupported_format",
                &[("ext", &ext)],
            )));
        }

        info!(
            file = %file_path,
            mode = %config.validation_mode,
            timeout_ms = config.store_timeout_ms,
            "开始批量导入"
        );

        let coordinator = BatchCoordinator::with_defaults(Arc::clone(&self.customer_repo), config);
        let report = coordinator.import_file(path, cancel).await;

        // 批次记录失败不影响导入结果
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        if let Err(e) = self.batch_repo.insert(&ImportBatch::from_report(&report, file_name)) {
            warn!(batch_id = %report.batch_id, error = %e, "导入批次记录写入失败");
        }

        let response = BulkUploadResponse::from(report);
        if response.status.is_rejected() {
            return Err(ApiError::ImportRejected {
                message: response.message.clone().unwrap_or_default(),
                response: Box::new(response),
            });
        }
        Ok(response)
    }

    /// 查询最近的导入批次
    ///
    /// # 参数
    /// - limit: 返回条数（1-100）
    pub fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        let limit = limit.clamp(1, 100);
        Ok(self.batch_repo.recent(limit)?)
    }
}
