// ==========================================
// CRM 销售管道系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod deal_repo;
pub mod entity_store;
pub mod error;
pub mod import_history_repo;
pub mod import_history_repo_impl;
pub mod lead_repo;
pub mod row_codec;

// 重导出核心仓储
pub use deal_repo::DealRepository;
pub use entity_store::{BatchScopedStore, BatchStoreRegistry, DealStageStore, EntityStore};
pub use error::{RepositoryError, RepositoryResult};
pub use import_history_repo::ImportHistoryStore;
pub use import_history_repo_impl::ImportHistoryRepositoryImpl;
pub use lead_repo::LeadRepository;
