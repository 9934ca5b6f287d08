// ==========================================
// CRM 销售管道系统 - 导入对账
// ==========================================
// 职责: 清理当前用户中途中断、长期停留在 processing 的导入历史
// 规则:
// - 库中存在该批次打标记录 → upsert 已生效，补记 completed（record_count = 实际行数）
// - 不存在 → 标记 failed，metadata.error = "interrupted"
// ==========================================

use crate::domain::{metadata_keys, ImportHistoryPatch, ImportStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{BatchStoreRegistry, ImportHistoryStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 中断导入的错误标记
pub const INTERRUPTED: &str = "interrupted";

/// 单条对账结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledImport {
    pub history_id: String,
    pub status: ImportStatus,
    pub record_count: usize,
}

// ==========================================
// ImportReconciler
// ==========================================
pub struct ImportReconciler<H>
where
    H: ImportHistoryStore,
{
    history: Arc<H>,
    stores: BatchStoreRegistry,
    stale_after: Duration,
}

impl<H> ImportReconciler<H>
where
    H: ImportHistoryStore,
{
    /// # 参数
    /// - stale_after: processing 记录超过该时长视为中断
    pub fn new(history: Arc<H>, stores: BatchStoreRegistry, stale_after: Duration) -> Self {
        Self {
            history,
            stores,
            stale_after,
        }
    }

    /// 按分钟数构造；超出 chrono 可表示范围时报错
    pub fn with_minutes(
        history: Arc<H>,
        stores: BatchStoreRegistry,
        minutes: i64,
    ) -> ImportResult<Self> {
        let stale_after = Duration::try_minutes(minutes)
            .ok_or(ImportError::StaleThresholdOutOfRange(minutes))?;
        Ok(Self::new(history, stores, stale_after))
    }

    /// 对指定用户执行一次对账；其他用户的记录不受影响
    pub async fn sweep(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ImportResult<Vec<ReconciledImport>> {
        let before = now
            .checked_sub_signed(self.stale_after)
            .ok_or(ImportError::StaleThresholdOutOfRange(self.stale_after.num_minutes()))?;
        let stale = self.history.find_stale_processing(user_id, before).await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let mut swept = Vec::with_capacity(stale.len());
        for record in stale {
            let tagged = match self.stores.get(record.import_type) {
                Some(store) => store.count_by_batch(&record.id).await?,
                None => 0,
            };

            let patch = if tagged > 0 {
                ImportHistoryPatch::status(ImportStatus::Completed)
                    .with_record_count(tagged as i64)
                    .with_metadata(metadata_keys::COMPLETED_AT, now.to_rfc3339())
            } else {
                ImportHistoryPatch::status(ImportStatus::Failed)
                    .with_metadata(metadata_keys::ERROR, INTERRUPTED)
            };
            let patch = patch.with_metadata(metadata_keys::RECONCILED_AT, now.to_rfc3339());

            let updated = self.history.update(&record.id, patch).await?;
            warn!(
                history_id = %updated.id,
                status = %updated.status,
                tagged,
                "中断的导入已对账"
            );
            swept.push(ReconciledImport {
                history_id: updated.id,
                status: updated.status,
                record_count: tagged,
            });
        }

        info!(user_id, count = swept.len(), "导入对账完成");
        Ok(swept)
    }
}
