// ==========================================
// CRM 销售管道系统 - 批量导入器
// ==========================================
// 流程: 创建 processing 历史 → 打批次标记 → 单次 upsert → 终态化历史
// 红线: 三步按固定顺序串行执行，不重试
// 红线: upsert 失败时先把历史标记为 failed，再上抛错误
// 同一批次内 prospect_id 重复时只保留最后一行，record_count 按去重后计
// ==========================================

use crate::domain::{metadata_keys, ImportHistory, ImportHistoryPatch, ImportStatus, ImportableEntity};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{EntityStore, ImportHistoryStore};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// 一次导入请求的上下文
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub user_id: String,
    pub file_name: String,
    /// 解析阶段跳过的行数（写入 metadata）
    pub skipped_rows: usize,
}

impl ImportRequest {
    pub fn new(user_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            file_name: file_name.into(),
            skipped_rows: 0,
        }
    }

    pub fn with_skipped_rows(mut self, skipped_rows: usize) -> Self {
        self.skipped_rows = skipped_rows;
        self
    }
}

/// 导入结果
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub batch_id: String,
    /// 实际插入/更新的行数
    pub record_count: usize,
    pub skipped_rows: usize,
    pub history: ImportHistory,
}

// ==========================================
// BatchImporter
// ==========================================
pub struct BatchImporter<H>
where
    H: ImportHistoryStore,
{
    history: Arc<H>,
}

impl<H> BatchImporter<H>
where
    H: ImportHistoryStore,
{
    pub fn new(history: Arc<H>) -> Self {
        Self { history }
    }

    /// 执行批量导入
    ///
    /// # 参数
    /// - store: 目标实体存储（导入类型由其记录类型决定）
    /// - records: 已映射的实体记录
    /// - request: 用户 / 文件名 / 跳过行数
    ///
    /// # 返回
    /// - Err(NoData): 空输入，不落任何数据
    /// - Err(StoreWriteError): 历史写入或 upsert 失败
    #[instrument(skip(self, store, records), fields(user_id = %request.user_id, file_name = %request.file_name))]
    pub async fn import<S>(
        &self,
        store: &S,
        records: Vec<S::Record>,
        request: ImportRequest,
    ) -> ImportResult<ImportOutcome>
    where
        S: EntityStore,
    {
        if records.is_empty() {
            warn!("没有可导入的记录");
            return Err(ImportError::NoData);
        }

        let import_type = <S::Record as ImportableEntity>::IMPORT_TYPE;
        let mut records = dedup_by_prospect_id(records);

        // === 步骤 1: 创建 processing 历史 ===
        let pending = ImportHistory::processing(
            &request.user_id,
            import_type,
            &request.file_name,
            records.len(),
            Utc::now(),
        );
        let batch_id = self.history.insert(pending).await?;
        info!(batch_id = %batch_id, %import_type, record_count = records.len(), "导入批次已创建");

        // === 步骤 2: 打批次标记 ===
        for record in records.iter_mut() {
            record.set_import_batch_id(&batch_id);
        }

        // === 步骤 3: upsert ===
        let record_count = match store.upsert(records).await {
            Ok(count) => count,
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "批量 upsert 失败");
                let patch = ImportHistoryPatch::status(ImportStatus::Failed)
                    .with_metadata(metadata_keys::ERROR, e.to_string());
                if let Err(update_err) = self.history.update(&batch_id, patch).await {
                    error!(batch_id = %batch_id, error = %update_err, "导入历史标记 failed 失败");
                }
                return Err(ImportError::StoreWriteError(e));
            }
        };

        // === 步骤 4: 终态化历史 ===
        let mut patch = ImportHistoryPatch::status(ImportStatus::Completed)
            .with_record_count(record_count as i64)
            .with_metadata(metadata_keys::COMPLETED_AT, Utc::now().to_rfc3339());
        if request.skipped_rows > 0 {
            patch = patch.with_metadata(metadata_keys::SKIPPED_ROWS, request.skipped_rows);
        }
        let history = self.history.update(&batch_id, patch).await?;

        info!(
            batch_id = %batch_id,
            record_count,
            skipped = request.skipped_rows,
            "导入完成"
        );

        Ok(ImportOutcome {
            batch_id,
            record_count,
            skipped_rows: request.skipped_rows,
            history,
        })
    }
}

/// 按 prospect_id 去重：保留首次出现的位置，内容取最后一行
fn dedup_by_prospect_id<R: ImportableEntity>(records: Vec<R>) -> Vec<R> {
    let total = records.len();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut unique: Vec<R> = Vec::with_capacity(total);

    for record in records {
        match positions.get(record.prospect_id()) {
            Some(&index) => unique[index] = record,
            None => {
                positions.insert(record.prospect_id().to_string(), unique.len());
                unique.push(record);
            }
        }
    }

    if unique.len() < total {
        warn!(
            duplicates = total - unique.len(),
            "批次内 prospect_id 重复，已按最后一行合并"
        );
    }
    unique
}
