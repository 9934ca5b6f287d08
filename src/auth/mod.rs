// ==========================================
// CRM 销售管道系统 - 认证层
// ==========================================
// 职责: 提供当前用户；会话过期时尝试刷新，失败则要求重新登录
// ==========================================

pub mod provider;

pub use provider::{require_user, AuthProvider, SessionAuthProvider, StaticAuthProvider};

use thiserror::Error;

/// 认证错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("未登录")]
    NotAuthenticated,

    #[error("会话已过期，请重新登录")]
    SessionExpired,
}
