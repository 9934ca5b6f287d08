// ==========================================
// CRM 销售管道系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI 调用
// 约定: 每个操作先经 AuthProvider 认证
// ==========================================

pub mod error;
pub mod import_api;
pub mod pipeline_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse};
pub use pipeline_api::PipelineApi;
