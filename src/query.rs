// ==========================================
// CRM 销售管道系统 - 列表查询
// ==========================================
// 职责: 对已加载的实体列表做 搜索 / 等值过滤 / 排序
// 红线: 排序稳定；空值始终排在最后（与方向无关）
// ==========================================

use crate::domain::{Deal, FieldValue, Lead};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ==========================================
// Listable - 可查询实体
// ==========================================
pub trait Listable {
    /// 按字段名取值；未知字段返回 None
    fn field_value(&self, name: &str) -> Option<FieldValue>;

    /// 参与关键字搜索的字段
    fn searchable_fields() -> &'static [&'static str];
}

impl Listable for Lead {
    fn field_value(&self, name: &str) -> Option<FieldValue> {
        self.field(name)
    }

    fn searchable_fields() -> &'static [&'static str] {
        &[
            "business_name",
            "contact_name",
            "email",
            "phone",
            "city",
            "prospect_id",
            "notes",
        ]
    }
}

impl Listable for Deal {
    fn field_value(&self, name: &str) -> Option<FieldValue> {
        self.field(name)
    }

    fn searchable_fields() -> &'static [&'static str] {
        &["deal_name", "business_name", "contact_name", "prospect_id", "notes"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("无效的排序方向: {}", other)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

// ==========================================
// ListQuery
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// 关键字（大小写不敏感的子串匹配）
    pub search: Option<String>,
    /// 等值过滤（全部满足）
    pub filters: Vec<FieldFilter>,
    pub sort: Option<SortSpec>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            direction,
        });
        self
    }

    /// 单条记录是否满足搜索与过滤条件
    ///
    /// 过滤字段未知时视为不满足
    pub fn matches<T: Listable>(&self, item: &T) -> bool {
        self.matches_search(item)
            && self.filters.iter().all(|filter| {
                item.field_value(&filter.field)
                    .map(|v| v.matches_str(&filter.value))
                    .unwrap_or(false)
            })
    }

    fn matches_search<T: Listable>(&self, item: &T) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            None | Some("") => return true,
            Some(s) => s.to_lowercase(),
        };
        T::searchable_fields().iter().any(|name| {
            matches!(
                item.field_value(name),
                Some(FieldValue::Text(text)) if text.to_lowercase().contains(&needle)
            )
        })
    }

    /// 过滤 + 排序
    pub fn apply<T: Listable>(&self, items: Vec<T>) -> Vec<T> {
        let mut result: Vec<T> = items.into_iter().filter(|item| self.matches(item)).collect();

        if let Some(sort) = &self.sort {
            result.sort_by(|a, b| {
                compare_nulls_last(
                    a.field_value(&sort.field),
                    b.field_value(&sort.field),
                    sort.direction,
                )
            });
        }
        result
    }
}

/// 空值（含未知字段）排最后；其余按方向比较，不可比视为相等
fn compare_nulls_last(
    a: Option<FieldValue>,
    b: Option<FieldValue>,
    direction: SortDirection,
) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp_same_kind(&b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}
