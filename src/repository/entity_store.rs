// ==========================================
// CRM 销售管道系统 - 实体存储 Trait
// ==========================================
// 职责: 定义实体数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{ImportType, ImportableEntity, PipelineStage};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

// ==========================================
// BatchScopedStore - 按导入批次操作
// ==========================================
// 用途: 撤销执行器按 import_type 选择存储（对象安全）
// 实现者: LeadRepository, DealRepository
#[async_trait]
pub trait BatchScopedStore: Send + Sync {
    /// 存储对应的实体种类
    fn import_type(&self) -> ImportType;

    /// 删除指定批次打标的全部记录
    ///
    /// # 返回
    /// - Ok(usize): 删除行数（0 不是错误）
    async fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize>;

    /// 统计指定批次打标的记录数
    async fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize>;
}

// ==========================================
// BatchStoreRegistry - 按实体种类查找存储
// ==========================================
#[derive(Clone, Default)]
pub struct BatchStoreRegistry {
    stores: Vec<Arc<dyn BatchScopedStore>>,
}

impl BatchStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册存储（同种类后注册者覆盖先注册者）
    pub fn with_store(mut self, store: Arc<dyn BatchScopedStore>) -> Self {
        let import_type = store.import_type();
        self.stores.retain(|s| s.import_type() != import_type);
        self.stores.push(store);
        self
    }

    pub fn get(&self, import_type: ImportType) -> Option<&Arc<dyn BatchScopedStore>> {
        self.stores.iter().find(|s| s.import_type() == import_type)
    }
}

// ==========================================
// EntityStore - 实体存储
// ==========================================
#[async_trait]
pub trait EntityStore: BatchScopedStore {
    type Record: ImportableEntity;

    /// 以 prospect_id 为冲突键批量 upsert（冲突时原地更新）
    ///
    /// # 返回
    /// - Ok(usize): 实际插入/更新的行数
    /// - Err: 数据库错误（整个批次回滚）
    async fn upsert(&self, records: Vec<Self::Record>) -> RepositoryResult<usize>;

    /// 查询用户全部记录（按创建顺序）
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Self::Record>>;

    /// 查询指定批次的记录
    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<Self::Record>>;

    /// 库中已存在的全部 prospect_id（编号查重用）
    async fn existing_prospect_ids(&self) -> RepositoryResult<HashSet<String>>;

    /// 记录总数
    async fn count(&self) -> RepositoryResult<usize>;
}

// ==========================================
// DealStageStore - 商机阶段单字段更新
// ==========================================
#[async_trait]
pub trait DealStageStore: Send + Sync {
    /// 仅更新 stage（与 updated_at）
    ///
    /// # 返回
    /// - Err(NotFound): 商机不存在
    async fn update_stage(&self, deal_id: &str, stage: PipelineStage) -> RepositoryResult<()>;
}
