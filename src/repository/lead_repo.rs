// ==========================================
// CRM 销售管道系统 - 线索数据仓储
// ==========================================
// 对齐: leads 表
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::{ImportType, ImportableEntity, Lead};
use crate::repository::entity_store::{BatchScopedStore, EntityStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_timestamp, get_enum, get_timestamp};
use async_trait::async_trait;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, prospect_id, business_name, contact_name,
           email, phone, city, deal_value, bf_interest, ct_interest, ba_interest,
           status, notes, import_batch_id, created_at, updated_at
    FROM leads
"#;

// ==========================================
// LeadRepository - 线索仓储
// ==========================================
pub struct LeadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LeadRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Lead> {
        Ok(Lead {
            id: row.get(0)?,
            user_id: row.get(1)?,
            prospect_id: row.get(2)?,
            business_name: row.get(3)?,
            contact_name: row.get(4)?,
            email: row.get(5)?,
            phone: row.get(6)?,
            city: row.get(7)?,
            deal_value: row.get(8)?,
            bf_interest: row.get(9)?,
            ct_interest: row.get(10)?,
            ba_interest: row.get(11)?,
            status: get_enum(row, 12)?,
            notes: row.get(13)?,
            import_batch_id: row.get(14)?,
            created_at: get_timestamp(row, 15)?,
            updated_at: get_timestamp(row, 16)?,
        })
    }

    fn query_leads(&self, where_clause: &str, arg: &str) -> RepositoryResult<Vec<Lead>> {
        let conn = self.get_conn()?;
        let sql = format!("{} {} ORDER BY created_at ASC, rowid ASC", SELECT_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let leads = stmt
            .query_map(params![arg], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(leads)
    }

    /// 按 prospect_id 查询
    pub fn find_by_prospect_id(&self, prospect_id: &str) -> RepositoryResult<Option<Lead>> {
        Ok(self
            .query_leads("WHERE prospect_id = ?1", prospect_id)?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl BatchScopedStore for LeadRepository {
    fn import_type(&self) -> ImportType {
        Lead::IMPORT_TYPE
    }

    async fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM leads WHERE import_batch_id = ?1", params![batch_id])?;
        debug!(batch_id = %batch_id, rows = rows, "按批次删除线索");
        Ok(rows)
    }

    async fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE import_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl EntityStore for LeadRepository {
    type Record = Lead;

    /// 批量 upsert（事务化）
    ///
    /// 冲突时保留已有 id / created_at；其他用户的同号记录不被覆盖（计数为 0）
    async fn upsert(&self, records: Vec<Lead>) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO leads (
                    id, user_id, prospect_id, business_name, contact_name,
                    email, phone, city, deal_value, bf_interest, ct_interest, ba_interest,
                    status, notes, import_batch_id, created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
                )
                ON CONFLICT(prospect_id) DO UPDATE SET
                    business_name = excluded.business_name,
                    contact_name = excluded.contact_name,
                    email = excluded.email,
                    phone = excluded.phone,
                    city = excluded.city,
                    deal_value = excluded.deal_value,
                    bf_interest = excluded.bf_interest,
                    ct_interest = excluded.ct_interest,
                    ba_interest = excluded.ba_interest,
                    status = excluded.status,
                    notes = excluded.notes,
                    import_batch_id = excluded.import_batch_id,
                    updated_at = excluded.updated_at
                WHERE leads.user_id = excluded.user_id
                "#,
            )?;

            for lead in &records {
                count += stmt.execute(params![
                    lead.id,
                    lead.user_id,
                    lead.prospect_id,
                    lead.business_name,
                    lead.contact_name,
                    lead.email,
                    lead.phone,
                    lead.city,
                    lead.deal_value,
                    lead.bf_interest,
                    lead.ct_interest,
                    lead.ba_interest,
                    lead.status.as_str(),
                    lead.notes,
                    lead.import_batch_id,
                    format_timestamp(&lead.created_at),
                    format_timestamp(&lead.updated_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Lead>> {
        self.query_leads("WHERE user_id = ?1", user_id)
    }

    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<Lead>> {
        self.query_leads("WHERE import_batch_id = ?1", batch_id)
    }

    async fn existing_prospect_ids(&self) -> RepositoryResult<HashSet<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT prospect_id FROM leads")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<HashSet<_>>>()?;
        Ok(ids)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipelineStage;
    use chrono::Utc;

    fn setup() -> LeadRepository {
        let conn = crate::db::open_in_memory().unwrap();
        LeadRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn make_lead(user_id: &str, prospect_id: &str, business_name: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prospect_id: prospect_id.to_string(),
            business_name: business_name.to_string(),
            contact_name: "John Smith".to_string(),
            email: None,
            phone: None,
            city: None,
            deal_value: Some(5000.0),
            bf_interest: true,
            ct_interest: false,
            ba_interest: false,
            status: PipelineStage::New,
            notes: None,
            import_batch_id: Some("batch-1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let repo = setup();
        let first = make_lead("u1", "LEAD-1", "Acme Inc");
        let original_id = first.id.clone();

        assert_eq!(repo.upsert(vec![first]).await.unwrap(), 1);

        let mut second = make_lead("u1", "LEAD-1", "Acme Holdings");
        second.import_batch_id = Some("batch-2".to_string());
        assert_eq!(repo.upsert(vec![second]).await.unwrap(), 1);

        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.find_by_prospect_id("LEAD-1").unwrap().unwrap();
        assert_eq!(stored.id, original_id);
        assert_eq!(stored.business_name, "Acme Holdings");
        assert_eq!(stored.import_batch_id.as_deref(), Some("batch-2"));
    }

    #[tokio::test]
    async fn test_upsert_does_not_touch_other_users_rows() {
        let repo = setup();
        repo.upsert(vec![make_lead("u1", "LEAD-1", "Acme Inc")]).await.unwrap();

        let written = repo
            .upsert(vec![make_lead("u2", "LEAD-1", "Hijack Ltd")])
            .await
            .unwrap();

        assert_eq!(written, 0);
        let stored = repo.find_by_prospect_id("LEAD-1").unwrap().unwrap();
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.business_name, "Acme Inc");
    }

    #[tokio::test]
    async fn test_delete_by_batch_is_idempotent() {
        let repo = setup();
        repo.upsert(vec![
            make_lead("u1", "LEAD-1", "A"),
            make_lead("u1", "LEAD-2", "B"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.count_by_batch("batch-1").await.unwrap(), 2);
        assert_eq!(repo.delete_by_batch("batch-1").await.unwrap(), 2);
        assert_eq!(repo.delete_by_batch("batch-1").await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_user_preserves_insert_order() {
        let repo = setup();
        repo.upsert(vec![
            make_lead("u1", "LEAD-1", "First"),
            make_lead("u1", "LEAD-2", "Second"),
            make_lead("u2", "LEAD-3", "Other"),
        ])
        .await
        .unwrap();

        let leads = repo.find_by_user("u1").await.unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.business_name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);

        let ids = repo.existing_prospect_ids().await.unwrap();
        assert_eq!(ids.len(), 3);
    }
}
