// ==========================================
// CRM 销售管道系统 - 导入历史 Repository Trait
// ==========================================
// 职责: 定义导入历史数据访问接口（不包含业务逻辑）
// 红线: can_revert 不在此层计算
// ==========================================

use crate::domain::{ImportHistory, ImportHistoryPatch, ImportType};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ==========================================
// ImportHistoryStore Trait
// ==========================================
// 实现者: ImportHistoryRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportHistoryStore: Send + Sync {
    /// 追加历史记录
    ///
    /// # 返回
    /// - Ok(String): 记录 ID
    async fn insert(&self, record: ImportHistory) -> RepositoryResult<String>;

    /// 局部更新（metadata 按键合并）
    ///
    /// # 返回
    /// - Ok(ImportHistory): 更新后的记录
    /// - Err(NotFound): 记录不存在
    async fn update(&self, id: &str, patch: ImportHistoryPatch) -> RepositoryResult<ImportHistory>;

    /// 按 ID 查询
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ImportHistory>>;

    /// 查询用户某类型最近 N 条导入（最新在前）
    async fn list_recent(
        &self,
        user_id: &str,
        import_type: ImportType,
        limit: usize,
    ) -> RepositoryResult<Vec<ImportHistory>>;

    /// 用户某类型最新的 completed 记录（唯一可撤销的批次）
    async fn find_latest_completed(
        &self,
        user_id: &str,
        import_type: ImportType,
    ) -> RepositoryResult<Option<ImportHistory>>;

    /// 查询用户早于指定时间仍处于 processing 的记录
    async fn find_stale_processing(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ImportHistory>>;
}
