// ==========================================
// CRM 销售管道系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑
// ==========================================

pub mod entity;
pub mod import_history;
pub mod types;
pub mod user;

// 重导出核心类型
pub use entity::{Deal, ImportableEntity, Lead};
pub use import_history::{
    derive_revert_flags, metadata_keys, ImportHistory, ImportHistoryPatch, ImportHistoryView,
};
pub use types::{FieldValue, ImportStatus, ImportType, ParseEnumError, PipelineStage};
pub use user::{Session, User};
