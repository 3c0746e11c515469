// ==========================================
// 客户档案管理系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行与上层调用
// ==========================================

pub mod customer_api;
pub mod dto;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use customer_api::CustomerApi;
pub use dto::{AddressDto, BulkUploadResponse, CustomerDto};
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
