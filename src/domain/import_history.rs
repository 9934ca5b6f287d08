// ==========================================
// CRM 销售管道系统 - 导入历史领域模型
// ==========================================
// 用途: 每次批量导入对应一条记录，驱动撤销流程
// 红线: can_revert 为读时派生，不落库
// ==========================================

use crate::domain::types::{ImportStatus, ImportType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 元数据键
pub mod metadata_keys {
    pub const SOURCE: &str = "source";
    pub const ERROR: &str = "error";
    pub const COMPLETED_AT: &str = "completed_at";
    pub const REVERTED_AT: &str = "reverted_at";
    pub const DELETED_COUNT: &str = "deleted_count";
    pub const SKIPPED_ROWS: &str = "skipped_rows";
    pub const RECONCILED_AT: &str = "reconciled_at";

    /// 上传来源固定值
    pub const SOURCE_CSV_UPLOAD: &str = "csv_upload";
}

// ==========================================
// ImportHistory - 导入历史记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHistory {
    pub id: String,
    pub user_id: String,
    pub import_type: ImportType,
    pub file_name: String,
    pub record_count: i64,
    pub status: ImportStatus,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportHistory {
    /// 新建 processing 状态记录（尚未落库）
    pub fn processing(
        user_id: &str,
        import_type: ImportType,
        file_name: &str,
        record_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            metadata_keys::SOURCE.to_string(),
            Value::String(metadata_keys::SOURCE_CSV_UPLOAD.to_string()),
        );

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            import_type,
            file_name: file_name.to_string(),
            record_count: record_count as i64,
            status: ImportStatus::Processing,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.metadata.get(metadata_keys::ERROR).and_then(Value::as_str)
    }
}

// ==========================================
// ImportHistoryPatch - 局部更新
// ==========================================
// metadata 按键合并（不整体覆盖）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportHistoryPatch {
    pub status: Option<ImportStatus>,
    pub record_count: Option<i64>,
    pub metadata: Map<String, Value>,
}

impl ImportHistoryPatch {
    pub fn status(status: ImportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_record_count(mut self, count: i64) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// 将补丁应用到记录（仓储实现与内存实现共用）
    pub fn apply_to(&self, record: &mut ImportHistory, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(count) = self.record_count {
            record.record_count = count;
        }
        for (key, value) in &self.metadata {
            record.metadata.insert(key.clone(), value.clone());
        }
        record.updated_at = now;
    }
}

// ==========================================
// ImportHistoryView - 带派生标记的查询结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHistoryView {
    #[serde(flatten)]
    pub record: ImportHistory,
    pub can_revert: bool,
}

/// 计算 can_revert
///
/// # 规则
/// - 输入按 created_at 倒序（最新在前）
/// - 仅当前页中最新的一条 completed 记录可撤销
pub fn derive_revert_flags(page: Vec<ImportHistory>) -> Vec<ImportHistoryView> {
    let mut flagged = false;
    page.into_iter()
        .map(|record| {
            let can_revert = !flagged && record.status == ImportStatus::Completed;
            if can_revert {
                flagged = true;
            }
            ImportHistoryView { record, can_revert }
        })
        .collect()
}
