// ==========================================
// CRM 销售管道系统 - 领域类型定义
// ==========================================
// 管道阶段 / 导入状态 / 导入类型 / 标量字段值
// 序列化格式与数据库存储格式一致
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 枚举解析失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的{kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ==========================================
// 管道阶段 (Pipeline Stage)
// ==========================================
// 固定有序集合；阶段之间无流转限制，任意阶段可直接移动到任意阶段
// 派生 Ord 依赖变体声明顺序 = 看板列顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Contacted")]
    Contacted,
    #[serde(rename = "Qualified")]
    Qualified,
    #[serde(rename = "Proposal Sent")]
    ProposalSent,
    #[serde(rename = "Negotiation")]
    Negotiation,
    #[serde(rename = "Deal Closed")]
    DealClosed,
    #[serde(rename = "Deal Lost")]
    DealLost,
}

impl PipelineStage {
    /// 全部阶段（看板列顺序）
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::New,
        PipelineStage::Contacted,
        PipelineStage::Qualified,
        PipelineStage::ProposalSent,
        PipelineStage::Negotiation,
        PipelineStage::DealClosed,
        PipelineStage::DealLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::New => "New",
            PipelineStage::Contacted => "Contacted",
            PipelineStage::Qualified => "Qualified",
            PipelineStage::ProposalSent => "Proposal Sent",
            PipelineStage::Negotiation => "Negotiation",
            PipelineStage::DealClosed => "Deal Closed",
            PipelineStage::DealLost => "Deal Lost",
        }
    }

    /// 是否为终态（成交/丢单）
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::DealClosed | PipelineStage::DealLost)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = ParseEnumError;

    /// 接受展示名（大小写不敏感）以及 snake/kebab 写法，如 "deal_closed"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        PipelineStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ParseEnumError::new("管道阶段", s))
    }
}

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// 生命周期: processing → completed | failed；completed → reverted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Processing,
    Completed,
    Failed,
    Reverted,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
            ImportStatus::Reverted => "reverted",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            "reverted" => Ok(ImportStatus::Reverted),
            _ => Err(ParseEnumError::new("导入状态", s)),
        }
    }
}

// ==========================================
// 导入类型 (Import Type)
// ==========================================
// 即实体种类；决定撤销时删除哪张表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    Leads,
    Deals,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::Leads => "leads",
            ImportType::Deals => "deals",
        }
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "leads" | "lead" => Ok(ImportType::Leads),
            "deals" | "deal" => Ok(ImportType::Deals),
            _ => Err(ParseEnumError::new("导入类型", s)),
        }
    }
}

// ==========================================
// 标量字段值 (Field Value)
// ==========================================
// 用于列表查询的按字段过滤/排序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map(FieldValue::text).unwrap_or(FieldValue::Null)
    }

    pub fn opt_number(value: Option<f64>) -> Self {
        value.map(FieldValue::Number).unwrap_or(FieldValue::Null)
    }

    /// 与过滤条件中的字符串比较（文本大小写不敏感）
    pub fn matches_str(&self, expected: &str) -> bool {
        let expected = expected.trim();
        match self {
            FieldValue::Null => expected.is_empty(),
            FieldValue::Bool(b) => expected
                .parse::<bool>()
                .map(|v| v == *b)
                .unwrap_or(false),
            FieldValue::Number(n) => expected.parse::<f64>().map(|v| v == *n).unwrap_or(false),
            FieldValue::Timestamp(ts) => ts.to_rfc3339() == expected,
            FieldValue::Text(t) => t.eq_ignore_ascii_case(expected),
        }
    }

    /// 同类值比较；不同类或 Null 返回 None（由调用方决定 Null 排序位置）
    pub fn partial_cmp_same_kind(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            (FieldValue::Text(a), FieldValue::Text(b)) => {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            }
            _ => None,
        }
    }
}
