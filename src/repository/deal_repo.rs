// ==========================================
// CRM 销售管道系统 - 商机数据仓储
// ==========================================
// 对齐: deals 表
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::{Deal, ImportType, ImportableEntity, PipelineStage};
use crate::repository::entity_store::{BatchScopedStore, DealStageStore, EntityStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    format_date, format_timestamp, get_enum, get_opt_date, get_timestamp,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, prospect_id, deal_name, business_name, contact_name,
           deal_value, stage, expected_close_date, notes, import_batch_id,
           created_at, updated_at
    FROM deals
"#;

// ==========================================
// DealRepository - 商机仓储
// ==========================================
pub struct DealRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DealRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Deal> {
        Ok(Deal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            prospect_id: row.get(2)?,
            deal_name: row.get(3)?,
            business_name: row.get(4)?,
            contact_name: row.get(5)?,
            deal_value: row.get(6)?,
            stage: get_enum(row, 7)?,
            expected_close_date: get_opt_date(row, 8)?,
            notes: row.get(9)?,
            import_batch_id: row.get(10)?,
            created_at: get_timestamp(row, 11)?,
            updated_at: get_timestamp(row, 12)?,
        })
    }

    fn query_deals(&self, where_clause: &str, arg: &str) -> RepositoryResult<Vec<Deal>> {
        let conn = self.get_conn()?;
        let sql = format!("{} {} ORDER BY created_at ASC, rowid ASC", SELECT_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let deals = stmt
            .query_map(params![arg], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(deals)
    }

    /// 按 ID 查询单个商机
    pub fn find_by_id(&self, deal_id: &str) -> RepositoryResult<Option<Deal>> {
        Ok(self.query_deals("WHERE id = ?1", deal_id)?.into_iter().next())
    }
}

#[async_trait]
impl BatchScopedStore for DealRepository {
    fn import_type(&self) -> ImportType {
        Deal::IMPORT_TYPE
    }

    async fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM deals WHERE import_batch_id = ?1", params![batch_id])?;
        debug!(batch_id = %batch_id, rows = rows, "按批次删除商机");
        Ok(rows)
    }

    async fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM deals WHERE import_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl EntityStore for DealRepository {
    type Record = Deal;

    async fn upsert(&self, records: Vec<Deal>) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO deals (
                    id, user_id, prospect_id, deal_name, business_name, contact_name,
                    deal_value, stage, expected_close_date, notes, import_batch_id,
                    created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13
                )
                ON CONFLICT(prospect_id) DO UPDATE SET
                    deal_name = excluded.deal_name,
                    business_name = excluded.business_name,
                    contact_name = excluded.contact_name,
                    deal_value = excluded.deal_value,
                    stage = excluded.stage,
                    expected_close_date = excluded.expected_close_date,
                    notes = excluded.notes,
                    import_batch_id = excluded.import_batch_id,
                    updated_at = excluded.updated_at
                WHERE deals.user_id = excluded.user_id
                "#,
            )?;

            for deal in &records {
                count += stmt.execute(params![
                    deal.id,
                    deal.user_id,
                    deal.prospect_id,
                    deal.deal_name,
                    deal.business_name,
                    deal.contact_name,
                    deal.deal_value,
                    deal.stage.as_str(),
                    deal.expected_close_date.as_ref().map(format_date),
                    deal.notes,
                    deal.import_batch_id,
                    format_timestamp(&deal.created_at),
                    format_timestamp(&deal.updated_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Deal>> {
        self.query_deals("WHERE user_id = ?1", user_id)
    }

    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<Deal>> {
        self.query_deals("WHERE import_batch_id = ?1", batch_id)
    }

    async fn existing_prospect_ids(&self) -> RepositoryResult<HashSet<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT prospect_id FROM deals")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<HashSet<_>>>()?;
        Ok(ids)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM deals", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl DealStageStore for DealRepository {
    async fn update_stage(&self, deal_id: &str, stage: PipelineStage) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE deals SET stage = ?2, updated_at = ?3 WHERE id = ?1",
            params![deal_id, stage.as_str(), format_timestamp(&Utc::now())],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found("Deal", deal_id));
        }

        debug!(deal_id = %deal_id, stage = %stage, "商机阶段已更新");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> DealRepository {
        let conn = crate::db::open_in_memory().unwrap();
        DealRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn make_deal(prospect_id: &str, stage: PipelineStage) -> Deal {
        let now = Utc::now();
        Deal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            prospect_id: prospect_id.to_string(),
            deal_name: format!("Deal {}", prospect_id),
            business_name: "Acme Inc".to_string(),
            contact_name: Some("John Smith".to_string()),
            deal_value: Some(1200.0),
            stage,
            expected_close_date: NaiveDate::from_ymd_opt(2026, 3, 31),
            notes: None,
            import_batch_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_update_stage_persists_single_field() {
        let repo = setup();
        let deal = make_deal("LEAD-1", PipelineStage::New);
        let deal_id = deal.id.clone();
        repo.upsert(vec![deal]).await.unwrap();

        repo.update_stage(&deal_id, PipelineStage::Negotiation).await.unwrap();

        let stored = repo.find_by_id(&deal_id).unwrap().unwrap();
        assert_eq!(stored.stage, PipelineStage::Negotiation);
        assert_eq!(stored.deal_value, Some(1200.0));
        assert_eq!(stored.expected_close_date, NaiveDate::from_ymd_opt(2026, 3, 31));
    }

    #[tokio::test]
    async fn test_update_stage_unknown_deal_is_not_found() {
        let repo = setup();
        let result = repo.update_stage("missing", PipelineStage::Contacted).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }
}
