// ==========================================
// CRM 销售管道系统 - 字段映射器
// ==========================================
// 职责: 原始行 → 实体记录（默认值 + 类型转换 + 派生字段）
// 红线: 必填字段在整批中缺失时整体中止，不做部分映射
// 红线: 输出顺序与输入顺序一致
// ==========================================

use crate::domain::{Deal, ImportableEntity, Lead, ParseEnumError, PipelineStage};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

// ==========================================
// 业务标识生成策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectIdStrategy {
    /// PREFIX-<0..9999>，不查重（冲突时覆盖已有记录）
    Random,
    /// 随机编号 + 查重，重试耗尽后退化为 UUID 后缀
    #[default]
    Checked,
    /// PREFIX-<uuid>
    Uuid,
}

impl ProspectIdStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProspectIdStrategy::Random => "random",
            ProspectIdStrategy::Checked => "checked",
            ProspectIdStrategy::Uuid => "uuid",
        }
    }

    /// 是否需要预先读取库中已有的 prospect_id
    pub fn needs_existing_ids(&self) -> bool {
        matches!(self, ProspectIdStrategy::Checked)
    }
}

impl fmt::Display for ProspectIdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProspectIdStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(ProspectIdStrategy::Random),
            "checked" => Ok(ProspectIdStrategy::Checked),
            "uuid" => Ok(ProspectIdStrategy::Uuid),
            _ => Err(ParseEnumError {
                kind: "编号策略",
                value: s.to_string(),
            }),
        }
    }
}

const RANDOM_ID_RANGE: u32 = 10_000;
const CHECKED_MAX_ATTEMPTS: usize = 32;

// ==========================================
// ProspectIdGenerator
// ==========================================
pub struct ProspectIdGenerator {
    strategy: ProspectIdStrategy,
    taken: HashSet<String>,
    rng: StdRng,
}

impl ProspectIdGenerator {
    /// # 参数
    /// - existing: 库中已有的 prospect_id（仅 Checked 策略使用）
    pub fn new(strategy: ProspectIdStrategy, existing: HashSet<String>) -> Self {
        Self {
            strategy,
            taken: existing,
            rng: StdRng::from_entropy(),
        }
    }

    /// 固定随机种子（测试用）
    pub fn with_seed(strategy: ProspectIdStrategy, existing: HashSet<String>, seed: u64) -> Self {
        Self {
            strategy,
            taken: existing,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn strategy(&self) -> ProspectIdStrategy {
        self.strategy
    }

    /// 登记批次内显式给出的 prospect_id
    pub fn reserve(&mut self, prospect_id: &str) {
        self.taken.insert(prospect_id.to_string());
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        match self.strategy {
            ProspectIdStrategy::Random => {
                format!("{}-{}", prefix, self.rng.gen_range(0..RANDOM_ID_RANGE))
            }
            ProspectIdStrategy::Uuid => format!("{}-{}", prefix, uuid::Uuid::new_v4()),
            ProspectIdStrategy::Checked => {
                for _ in 0..CHECKED_MAX_ATTEMPTS {
                    let candidate = format!("{}-{}", prefix, self.rng.gen_range(0..RANDOM_ID_RANGE));
                    if self.taken.insert(candidate.clone()) {
                        return candidate;
                    }
                }
                let fallback = format!("{}-{}", prefix, uuid::Uuid::new_v4().simple());
                debug!(prospect_id = %fallback, "随机编号重试耗尽，改用 UUID 后缀");
                self.taken.insert(fallback.clone());
                fallback
            }
        }
    }
}

// ==========================================
// RowMapper Trait
// ==========================================
// 实现者: LeadRowMapper, DealRowMapper
pub trait RowMapper: Send + Sync {
    type Record: ImportableEntity;

    /// 必填字段（标准字段名）
    fn required_fields(&self) -> &'static [&'static str];

    /// 生成业务标识时使用的前缀
    fn id_prefix(&self) -> &'static str;

    /// 映射单行（必填字段已在批次级校验）
    fn map_row(
        &self,
        row: &RawRow,
        user_id: &str,
        now: DateTime<Utc>,
        ids: &mut ProspectIdGenerator,
    ) -> Self::Record;

    /// 映射整批
    ///
    /// # 返回
    /// - Err(ValidationError): 某必填字段在所有行中都不存在
    fn map_rows(
        &self,
        rows: &[RawRow],
        user_id: &str,
        ids: &mut ProspectIdGenerator,
    ) -> ImportResult<Vec<Self::Record>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let missing: Vec<String> = self
            .required_fields()
            .iter()
            .filter(|field| !rows.iter().any(|row| has_field(row, field)))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "必填字段缺失，整批中止");
            return Err(ImportError::ValidationError { missing });
        }

        for row in rows {
            if let Some(prospect_id) = get_string(row, "prospect_id") {
                ids.reserve(&prospect_id);
            }
        }

        let now = Utc::now();
        let records: Vec<Self::Record> = rows
            .iter()
            .map(|row| self.map_row(row, user_id, now, ids))
            .collect();

        debug!(count = records.len(), strategy = %ids.strategy(), "行映射完成");
        Ok(records)
    }
}

// ==========================================
// LeadRowMapper
// ==========================================
pub struct LeadRowMapper;

impl RowMapper for LeadRowMapper {
    type Record = Lead;

    fn required_fields(&self) -> &'static [&'static str] {
        &["business_name", "contact_name"]
    }

    fn id_prefix(&self) -> &'static str {
        "LEAD"
    }

    fn map_row(
        &self,
        row: &RawRow,
        user_id: &str,
        now: DateTime<Utc>,
        ids: &mut ProspectIdGenerator,
    ) -> Lead {
        Lead {
            // 标识
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prospect_id: get_string(row, "prospect_id")
                .unwrap_or_else(|| ids.next_id(self.id_prefix())),

            // 基础信息
            business_name: get_string(row, "business_name").unwrap_or_default(),
            contact_name: get_string(row, "contact_name").unwrap_or_default(),
            email: get_string(row, "email"),
            phone: get_string(row, "phone"),
            city: get_string(row, "city"),

            // 商业信息
            deal_value: parse_number(row, "deal_value"),
            bf_interest: parse_flag(row, "bf_interest"),
            ct_interest: parse_flag(row, "ct_interest"),
            ba_interest: parse_flag(row, "ba_interest"),
            status: parse_stage(row, "status"),
            notes: get_string(row, "notes"),

            import_batch_id: None,

            created_at: parse_timestamp(row, "created_at").unwrap_or(now),
            updated_at: parse_timestamp(row, "updated_at").unwrap_or(now),
        }
    }
}

// ==========================================
// DealRowMapper
// ==========================================
pub struct DealRowMapper;

impl RowMapper for DealRowMapper {
    type Record = Deal;

    fn required_fields(&self) -> &'static [&'static str] {
        &["deal_name", "business_name"]
    }

    fn id_prefix(&self) -> &'static str {
        "DEAL"
    }

    fn map_row(
        &self,
        row: &RawRow,
        user_id: &str,
        now: DateTime<Utc>,
        ids: &mut ProspectIdGenerator,
    ) -> Deal {
        Deal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prospect_id: get_string(row, "prospect_id")
                .unwrap_or_else(|| ids.next_id(self.id_prefix())),

            deal_name: get_string(row, "deal_name").unwrap_or_default(),
            business_name: get_string(row, "business_name").unwrap_or_default(),
            contact_name: get_string(row, "contact_name"),
            deal_value: parse_number(row, "deal_value"),
            stage: parse_stage(row, "stage"),
            expected_close_date: parse_date(row, "expected_close_date"),
            notes: get_string(row, "notes"),

            import_batch_id: None,

            created_at: parse_timestamp(row, "created_at").unwrap_or(now),
            updated_at: parse_timestamp(row, "updated_at").unwrap_or(now),
        }
    }
}

// ==========================================
// 取值与类型转换
// ==========================================

/// 标准字段的列名别名（大小写不敏感）
fn aliases(key: &str) -> &'static [&'static str] {
    match key {
        "business_name" => &["business_name", "company", "company_name", "business"],
        "contact_name" => &["contact_name", "contact", "full_name"],
        "email" => &["email", "email_address"],
        "phone" => &["phone", "phone_number"],
        "deal_value" => &["deal_value", "value", "amount"],
        "deal_name" => &["deal_name", "deal", "title"],
        "expected_close_date" => &["expected_close_date", "close_date"],
        "notes" => &["notes", "note"],
        "status" => &["status", "stage"],
        "stage" => &["stage", "status"],
        "prospect_id" => &["prospect_id", "prospect"],
        "bf_interest" => &["bf_interest"],
        "ct_interest" => &["ct_interest"],
        "ba_interest" => &["ba_interest"],
        "city" => &["city"],
        "created_at" => &["created_at"],
        "updated_at" => &["updated_at"],
        _ => &[],
    }
}

fn lookup<'r>(row: &'r RawRow, key: &str) -> Option<&'r String> {
    aliases(key).iter().find_map(|alias| {
        row.iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(alias))
            .map(|(_, value)| value)
    })
}

/// 列是否存在（值可为空）
fn has_field(row: &RawRow, key: &str) -> bool {
    lookup(row, key).is_some()
}

/// 非空字符串
fn get_string(row: &RawRow, key: &str) -> Option<String> {
    lookup(row, key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// "true"/"yes"（大小写不敏感）为 true，其余及缺失为 false
fn parse_flag(row: &RawRow, key: &str) -> bool {
    get_string(row, key)
        .map(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// 无区域格式的十进制数；无法解析或缺失为 None
fn parse_number(row: &RawRow, key: &str) -> Option<f64> {
    get_string(row, key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// 阶段名无法识别时归入 New
fn parse_stage(row: &RawRow, key: &str) -> PipelineStage {
    match get_string(row, key) {
        None => PipelineStage::New,
        Some(value) => value.parse().unwrap_or_else(|e: ParseEnumError| {
            warn!(error = %e, "未知阶段，按 New 处理");
            PipelineStage::New
        }),
    }
}

fn parse_date(row: &RawRow, key: &str) -> Option<NaiveDate> {
    let value = get_string(row, key)?;
    ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&value, fmt).ok())
}

fn parse_timestamp(row: &RawRow, key: &str) -> Option<DateTime<Utc>> {
    let value = get_string(row, key)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ids() -> ProspectIdGenerator {
        ProspectIdGenerator::with_seed(ProspectIdStrategy::Checked, HashSet::new(), 7)
    }

    #[test]
    fn test_lead_mapper_example_row() {
        let rows = vec![row(&[
            ("business_name", "Acme Inc"),
            ("contact_name", "John Smith"),
            ("deal_value", "5000"),
            ("bf_interest", "true"),
        ])];

        let leads = LeadRowMapper.map_rows(&rows, "u1", &mut ids()).unwrap();
        assert_eq!(leads.len(), 1);

        let lead = &leads[0];
        assert_eq!(lead.business_name, "Acme Inc");
        assert_eq!(lead.contact_name, "John Smith");
        assert_eq!(lead.deal_value, Some(5000.0));
        assert!(lead.bf_interest);
        assert!(!lead.ct_interest);
        assert!(!lead.ba_interest);
        assert_eq!(lead.status, PipelineStage::New);
        assert!(lead.prospect_id.starts_with("LEAD-"));
        assert_eq!(lead.user_id, "u1");
        assert!(lead.import_batch_id.is_none());
    }

    #[test]
    fn test_flag_parsing() {
        for (input, expected) in [
            ("true", true),
            ("TRUE", true),
            ("yes", true),
            ("Yes", true),
            ("", false),
            ("false", false),
            ("1", false),
            ("y", false),
        ] {
            let r = row(&[("bf_interest", input)]);
            assert_eq!(parse_flag(&r, "bf_interest"), expected, "input {:?}", input);
        }
        assert!(!parse_flag(&row(&[]), "bf_interest"));
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(parse_number(&row(&[("value", "12.5")]), "deal_value"), Some(12.5));
        assert_eq!(parse_number(&row(&[("deal_value", "$5,000")]), "deal_value"), None);
        assert_eq!(parse_number(&row(&[("deal_value", "NaN")]), "deal_value"), None);
        assert_eq!(parse_number(&row(&[]), "deal_value"), None);
    }

    #[test]
    fn test_missing_required_field_aborts_batch() {
        let rows = vec![row(&[("business_name", "Acme Inc")])];
        let result = LeadRowMapper.map_rows(&rows, "u1", &mut ids());

        match result {
            Err(ImportError::ValidationError { missing }) => {
                assert_eq!(missing, vec!["contact_name".to_string()])
            }
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_aliases_and_case_insensitive_headers() {
        let rows = vec![row(&[
            ("Company", "Globex"),
            ("Contact", "Hank"),
            ("Value", "10"),
            ("Status", "proposal_sent"),
        ])];
        let leads = LeadRowMapper.map_rows(&rows, "u1", &mut ids()).unwrap();
        assert_eq!(leads[0].business_name, "Globex");
        assert_eq!(leads[0].contact_name, "Hank");
        assert_eq!(leads[0].deal_value, Some(10.0));
        assert_eq!(leads[0].status, PipelineStage::ProposalSent);
    }

    #[test]
    fn test_output_order_matches_input() {
        let rows: Vec<RawRow> = (0..5)
            .map(|i| {
                let name = format!("Biz {}", i);
                row(&[("business_name", name.as_str()), ("contact_name", "c")])
            })
            .collect();
        let leads = LeadRowMapper.map_rows(&rows, "u1", &mut ids()).unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.business_name.as_str()).collect();
        assert_eq!(names, vec!["Biz 0", "Biz 1", "Biz 2", "Biz 3", "Biz 4"]);
    }

    #[test]
    fn test_explicit_prospect_id_and_timestamps_are_kept() {
        let rows = vec![row(&[
            ("business_name", "Acme"),
            ("contact_name", "John"),
            ("prospect_id", "P-1"),
            ("created_at", "2025-03-01 10:00:00"),
        ])];
        let leads = LeadRowMapper.map_rows(&rows, "u1", &mut ids()).unwrap();
        assert_eq!(leads[0].prospect_id, "P-1");
        assert_eq!(leads[0].created_at.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_checked_strategy_avoids_existing_ids() {
        let existing: HashSet<String> = (0..RANDOM_ID_RANGE).map(|n| format!("LEAD-{}", n)).collect();
        let mut generator =
            ProspectIdGenerator::with_seed(ProspectIdStrategy::Checked, existing.clone(), 1);

        let id = generator.next_id("LEAD");
        assert!(!existing.contains(&id));
        assert!(id.starts_with("LEAD-"));
    }

    #[test]
    fn test_checked_strategy_is_unique_within_batch() {
        let mut generator = ids();
        let generated: HashSet<String> = (0..500).map(|_| generator.next_id("LEAD")).collect();
        assert_eq!(generated.len(), 500);
    }

    #[test]
    fn test_deal_mapper() {
        let rows = vec![row(&[
            ("deal_name", "Website redesign"),
            ("company", "Acme"),
            ("stage", "Negotiation"),
            ("close_date", "2026-12-31"),
        ])];
        let deals = DealRowMapper.map_rows(&rows, "u1", &mut ids()).unwrap();
        assert_eq!(deals[0].stage, PipelineStage::Negotiation);
        assert_eq!(
            deals[0].expected_close_date,
            NaiveDate::from_ymd_opt(2026, 12, 31)
        );
        assert!(deals[0].prospect_id.starts_with("DEAL-"));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("UUID".parse::<ProspectIdStrategy>().unwrap(), ProspectIdStrategy::Uuid);
        assert!("sequence".parse::<ProspectIdStrategy>().is_err());
    }
}
