// ==========================================
// CRM 销售管道系统 - 线索/商机领域模型
// ==========================================
// 红线: prospect_id 在同类实体内唯一，是 upsert 冲突键
// 红线: import_batch_id 为弱引用（只用于查找），不表达所有权
// ==========================================

use crate::domain::types::{FieldValue, ImportType, PipelineStage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportableEntity - 可批量导入的实体
// ==========================================
pub trait ImportableEntity: Clone + Send + Sync + 'static {
    /// 实体种类
    const IMPORT_TYPE: ImportType;

    fn id(&self) -> &str;

    fn user_id(&self) -> &str;

    /// 业务标识（冲突键）
    fn prospect_id(&self) -> &str;

    fn import_batch_id(&self) -> Option<&str>;

    /// 打上导入批次标记
    fn set_import_batch_id(&mut self, batch_id: &str);
}

// ==========================================
// Lead - 线索
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    // ===== 标识 =====
    pub id: String,          // 记录 ID（冲突更新时保留库中已有 ID）
    pub user_id: String,     // 所属用户
    pub prospect_id: String, // 业务标识

    // ===== 基础信息 =====
    pub business_name: String,
    pub contact_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,

    // ===== 商业信息 =====
    pub deal_value: Option<f64>,
    pub bf_interest: bool,
    pub ct_interest: bool,
    pub ba_interest: bool,
    pub status: PipelineStage,
    pub notes: Option<String>,

    // ===== 导入追溯 =====
    pub import_batch_id: Option<String>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportableEntity for Lead {
    const IMPORT_TYPE: ImportType = ImportType::Leads;

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn prospect_id(&self) -> &str {
        &self.prospect_id
    }

    fn import_batch_id(&self) -> Option<&str> {
        self.import_batch_id.as_deref()
    }

    fn set_import_batch_id(&mut self, batch_id: &str) {
        self.import_batch_id = Some(batch_id.to_string());
    }
}

impl Lead {
    /// 按字段名取值（列表过滤/排序用）
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::text(&self.id),
            "prospect_id" => FieldValue::text(&self.prospect_id),
            "business_name" => FieldValue::text(&self.business_name),
            "contact_name" => FieldValue::text(&self.contact_name),
            "email" => FieldValue::opt_text(self.email.as_deref()),
            "phone" => FieldValue::opt_text(self.phone.as_deref()),
            "city" => FieldValue::opt_text(self.city.as_deref()),
            "deal_value" => FieldValue::opt_number(self.deal_value),
            "bf_interest" => FieldValue::Bool(self.bf_interest),
            "ct_interest" => FieldValue::Bool(self.ct_interest),
            "ba_interest" => FieldValue::Bool(self.ba_interest),
            "status" => FieldValue::text(self.status.as_str()),
            "notes" => FieldValue::opt_text(self.notes.as_deref()),
            "import_batch_id" => FieldValue::opt_text(self.import_batch_id.as_deref()),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => return None,
        };
        Some(value)
    }
}

// ==========================================
// Deal - 商机（看板卡片）
// ==========================================
// 红线: stage ∈ PipelineStage，同一时刻只有一个阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub user_id: String,
    pub prospect_id: String,

    pub deal_name: String,
    pub business_name: String,
    pub contact_name: Option<String>,
    pub deal_value: Option<f64>,
    pub stage: PipelineStage,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,

    pub import_batch_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportableEntity for Deal {
    const IMPORT_TYPE: ImportType = ImportType::Deals;

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn prospect_id(&self) -> &str {
        &self.prospect_id
    }

    fn import_batch_id(&self) -> Option<&str> {
        self.import_batch_id.as_deref()
    }

    fn set_import_batch_id(&mut self, batch_id: &str) {
        self.import_batch_id = Some(batch_id.to_string());
    }
}

impl Deal {
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "id" => FieldValue::text(&self.id),
            "prospect_id" => FieldValue::text(&self.prospect_id),
            "deal_name" => FieldValue::text(&self.deal_name),
            "business_name" => FieldValue::text(&self.business_name),
            "contact_name" => FieldValue::opt_text(self.contact_name.as_deref()),
            "deal_value" => FieldValue::opt_number(self.deal_value),
            "stage" => FieldValue::text(self.stage.as_str()),
            "expected_close_date" => self
                .expected_close_date
                .map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(FieldValue::Null),
            "notes" => FieldValue::opt_text(self.notes.as_deref()),
            "import_batch_id" => FieldValue::opt_text(self.import_batch_id.as_deref()),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => return None,
        };
        Some(value)
    }
}
