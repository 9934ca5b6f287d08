// ==========================================
// CRM 销售管道系统 - 认证提供者
// ==========================================

use crate::auth::AuthError;
use crate::domain::{Session, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Mutex;
use tracing::{debug, warn};

// ==========================================
// AuthProvider Trait
// ==========================================
// 实现者: SessionAuthProvider, StaticAuthProvider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 是否存在过会话（无论是否过期）
    fn has_session(&self) -> bool;

    /// 当前有效会话的用户
    async fn current_user(&self) -> Option<User>;

    /// 刷新会话；无法刷新时返回 None
    async fn refresh_session(&self) -> Option<User>;
}

/// 获取当前用户：先取当前会话，失败则刷新一次
///
/// # 返回
/// - Err(SessionExpired): 存在过会话但无法刷新（调用方应重新登录）
/// - Err(NotAuthenticated): 从未登录
pub async fn require_user(provider: &dyn AuthProvider) -> Result<User, AuthError> {
    if !provider.has_session() {
        return Err(AuthError::NotAuthenticated);
    }

    if let Some(user) = provider.current_user().await {
        return Ok(user);
    }

    debug!("当前会话无效，尝试刷新");
    match provider.refresh_session().await {
        Some(user) => Ok(user),
        None => {
            warn!("会话刷新失败");
            Err(AuthError::SessionExpired)
        }
    }
}

// ==========================================
// SessionAuthProvider - 内存会话
// ==========================================
pub struct SessionAuthProvider {
    session: Mutex<Option<Session>>,
    session_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionAuthProvider {
    /// # 参数
    /// - session_ttl: 访问会话有效期
    /// - refresh_ttl: 刷新窗口（自登录起算）
    pub fn new(session_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            session_ttl,
            refresh_ttl,
        }
    }

    /// 从已有会话恢复
    pub fn from_session(session: Session, session_ttl: Duration) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            session_ttl,
            refresh_ttl: session_ttl,
        }
    }

    pub fn login(&self, user: User) -> Session {
        let now = Utc::now();
        let session = Session {
            user,
            expires_at: now + self.session_ttl,
            refresh_expires_at: now + self.refresh_ttl,
            is_revoked: false,
        };
        if let Ok(mut guard) = self.session.lock() {
            *guard = Some(session.clone());
        }
        session
    }

    pub fn logout(&self) {
        if let Ok(mut guard) = self.session.lock() {
            *guard = None;
        }
    }

    /// 吊销会话（不可刷新）
    pub fn revoke(&self) {
        if let Ok(mut guard) = self.session.lock() {
            if let Some(session) = guard.as_mut() {
                session.is_revoked = true;
            }
        }
    }
}

#[async_trait]
impl AuthProvider for SessionAuthProvider {
    fn has_session(&self) -> bool {
        self.session
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    async fn current_user(&self) -> Option<User> {
        let now = Utc::now();
        let guard = self.session.lock().ok()?;
        guard
            .as_ref()
            .filter(|s| s.is_active(now))
            .map(|s| s.user.clone())
    }

    async fn refresh_session(&self) -> Option<User> {
        let now = Utc::now();
        let mut guard = self.session.lock().ok()?;
        let session = guard.as_mut()?;
        if !session.can_refresh(now) {
            return None;
        }
        session.expires_at = now + self.session_ttl;
        debug!(user_id = %session.user.id, "会话已刷新");
        Some(session.user.clone())
    }
}

// ==========================================
// StaticAuthProvider - 固定用户（CLI / 测试）
// ==========================================
pub struct StaticAuthProvider {
    user: Option<User>,
}

impl StaticAuthProvider {
    pub fn new(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    fn has_session(&self) -> bool {
        self.user.is_some()
    }

    async fn current_user(&self) -> Option<User> {
        self.user.clone()
    }

    async fn refresh_session(&self) -> Option<User> {
        None
    }
}
