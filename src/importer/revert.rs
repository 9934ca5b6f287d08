// ==========================================
// CRM 销售管道系统 - 导入撤销执行器
// ==========================================
// 流程: 校验历史 → 删除批次打标记录 → 历史置为 reverted
// 红线: 仅当前用户该类型最新的 completed 批次可撤销；校验失败时不删除任何数据
// 较早批次的记录可能已被后续导入重新打标，撤销会误删
// 删除为幂等操作：0 行不是错误。状态更新失败时批次保持 completed，
// 再次撤销会删除 0 行并补写 reverted
// ==========================================

use crate::domain::{metadata_keys, ImportHistoryPatch, ImportStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{BatchStoreRegistry, ImportHistoryStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// 撤销结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevertOutcome {
    pub batch_id: String,
    pub deleted_count: usize,
}

// ==========================================
// RevertExecutor
// ==========================================
pub struct RevertExecutor<H>
where
    H: ImportHistoryStore,
{
    history: Arc<H>,
    stores: BatchStoreRegistry,
}

impl<H> RevertExecutor<H>
where
    H: ImportHistoryStore,
{
    pub fn new(history: Arc<H>, stores: BatchStoreRegistry) -> Self {
        Self { history, stores }
    }

    /// 撤销指定批次
    ///
    /// # 返回
    /// - Ok(RevertOutcome): 删除的记录数
    /// - Err(NotRevertible): 批次不存在 / 不属于当前用户 / 状态不是 completed / 不是最新的 completed
    /// - Err(StoreWriteError): 删除或状态更新失败
    #[instrument(skip(self))]
    pub async fn revert(&self, user_id: &str, batch_id: &str) -> ImportResult<RevertOutcome> {
        let record = self
            .history
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| ImportError::not_revertible(batch_id, "导入记录不存在"))?;

        if record.user_id != user_id {
            warn!(owner = %record.user_id, "拒绝撤销其他用户的批次");
            return Err(ImportError::not_revertible(batch_id, "导入记录不属于当前用户"));
        }

        if record.status != ImportStatus::Completed {
            warn!(status = %record.status, "批次状态不可撤销");
            return Err(ImportError::not_revertible_status(batch_id, record.status));
        }

        let latest = self
            .history
            .find_latest_completed(user_id, record.import_type)
            .await?;
        if latest.as_ref().map(|r| r.id.as_str()) != Some(batch_id) {
            warn!(
                latest = latest.as_ref().map(|r| r.id.as_str()).unwrap_or(""),
                "只能撤销最新的已完成批次"
            );
            return Err(ImportError::not_revertible(batch_id, "存在更新的已完成批次"));
        }

        let store = self
            .stores
            .get(record.import_type)
            .ok_or(ImportError::UnsupportedImportType(record.import_type))?;

        let deleted_count = store.delete_by_batch(batch_id).await?;
        info!(deleted_count, "批次记录已删除");

        let patch = ImportHistoryPatch::status(ImportStatus::Reverted)
            .with_metadata(metadata_keys::REVERTED_AT, Utc::now().to_rfc3339())
            .with_metadata(metadata_keys::DELETED_COUNT, deleted_count);
        if let Err(e) = self.history.update(batch_id, patch).await {
            error!(error = %e, deleted_count, "记录已删除但历史状态更新失败，可重新撤销");
            return Err(e.into());
        }

        Ok(RevertOutcome {
            batch_id: batch_id.to_string(),
            deleted_count,
        })
    }
}
