// ==========================================
// CRM 销售管道系统 - 用户与会话
// ==========================================
// 所有实体与导入历史都归属于唯一用户（user_id）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// 登录会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub expires_at: DateTime<Utc>,
    /// 刷新凭证截止时间；超过后只能重新登录
    pub refresh_expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl Session {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && now < self.expires_at
    }

    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && now < self.refresh_expires_at
    }
}
