// ==========================================
// CRM 销售管道系统 - 导入历史 Repository 实现
// ==========================================
// 职责: 实现导入历史数据访问（使用 rusqlite）
// 对齐: import_history 表
// ==========================================

use crate::domain::{ImportHistory, ImportHistoryPatch, ImportStatus, ImportType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_history_repo::ImportHistoryStore;
use crate::repository::row_codec::{format_timestamp, get_enum, get_json_map, get_timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, import_type, file_name, record_count, status,
           metadata_json, created_at, updated_at
    FROM import_history
"#;

// ==========================================
// ImportHistoryRepositoryImpl
// ==========================================
pub struct ImportHistoryRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportHistoryRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<ImportHistory> {
        Ok(ImportHistory {
            id: row.get(0)?,
            user_id: row.get(1)?,
            import_type: get_enum(row, 2)?,
            file_name: row.get(3)?,
            record_count: row.get(4)?,
            status: get_enum(row, 5)?,
            metadata: get_json_map(row, 6)?,
            created_at: get_timestamp(row, 7)?,
            updated_at: get_timestamp(row, 8)?,
        })
    }

    fn find_by_id_in(conn: &Connection, id: &str) -> RepositoryResult<Option<ImportHistory>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![id], Self::map_row)
            .optional()?;
        Ok(record)
    }
}

#[async_trait]
impl ImportHistoryStore for ImportHistoryRepositoryImpl {
    async fn insert(&self, record: ImportHistory) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_history (
                id, user_id, import_type, file_name, record_count, status,
                metadata_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.user_id,
                record.import_type.as_str(),
                record.file_name,
                record.record_count,
                record.status.as_str(),
                serde_json::to_string(&record.metadata)?,
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        )?;

        debug!(history_id = %record.id, status = %record.status, "导入历史已创建");
        Ok(record.id)
    }

    /// 读-合并-写 在同一事务内完成
    async fn update(&self, id: &str, patch: ImportHistoryPatch) -> RepositoryResult<ImportHistory> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut record = Self::find_by_id_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("ImportHistory", id))?;

        patch.apply_to(&mut record, Utc::now());

        tx.execute(
            r#"
            UPDATE import_history
            SET status = ?2, record_count = ?3, metadata_json = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.status.as_str(),
                record.record_count,
                serde_json::to_string(&record.metadata)?,
                format_timestamp(&record.updated_at),
            ],
        )?;

        tx.commit()?;

        debug!(history_id = %id, status = %record.status, "导入历史已更新");
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ImportHistory>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, id)
    }

    async fn list_recent(
        &self,
        user_id: &str,
        import_type: ImportType,
        limit: usize,
    ) -> RepositoryResult<Vec<ImportHistory>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE user_id = ?1 AND import_type = ?2 ORDER BY created_at DESC, rowid DESC LIMIT ?3",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![user_id, import_type.as_str(), limit as i64],
                Self::map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    async fn find_latest_completed(
        &self,
        user_id: &str,
        import_type: ImportType,
    ) -> RepositoryResult<Option<ImportHistory>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE user_id = ?1 AND import_type = ?2 AND status = ?3 \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![user_id, import_type.as_str(), ImportStatus::Completed.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn find_stale_processing(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ImportHistory>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE user_id = ?1 AND status = ?2 AND created_at < ?3 ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![
                    user_id,
                    ImportStatus::Processing.as_str(),
                    format_timestamp(&before)
                ],
                Self::map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}
