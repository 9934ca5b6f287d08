// ==========================================
// CRM 销售管道系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{ApiResult, ImportApi, PipelineApi};
use crate::auth::AuthProvider;
use crate::config::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::repository::{
    DealRepository, ImportHistoryRepositoryImpl, LeadRepository, RepositoryError,
};

/// 应用状态
///
/// 所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配置管理器
    pub config: Arc<ConfigManager>,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 看板与列表API
    pub pipeline_api: Arc<PipelineApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 为内存库）
    /// - auth: 认证提供者
    ///
    /// # 说明
    /// 1. 打开连接并建表
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: &str, auth: Arc<dyn AuthProvider>) -> ApiResult<Self> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(db_path).map_err(|e| {
            RepositoryError::DatabaseConnectionError(format!("无法打开数据库 {}: {}", db_path, e))
        })?;
        ensure_schema(&conn).map_err(RepositoryError::from)?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let config = Arc::new(ConfigManager::from_connection(conn.clone()));
        let history = Arc::new(ImportHistoryRepositoryImpl::new(conn.clone()));
        let leads = Arc::new(LeadRepository::new(conn.clone()));
        let deals = Arc::new(DealRepository::new(conn));

        // ==========================================
        // 初始化API层
        // ==========================================
        let import_api = Arc::new(ImportApi::new(
            auth.clone(),
            config.clone(),
            history,
            leads.clone(),
            deals.clone(),
        ));
        let pipeline_api = Arc::new(PipelineApi::new(auth, leads, deals));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path: db_path.to_string(),
            config,
            import_api,
            pipeline_api,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 CRM_PIPELINE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("CRM_PIPELINE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./crm_pipeline.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("crm-pipeline");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("crm_pipeline.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthProvider;
    use crate::domain::User;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[tokio::test]
    async fn test_app_state_in_memory() {
        let auth = Arc::new(StaticAuthProvider::new(User::new("u1")));
        let state = AppState::new(":memory:", auth).unwrap();

        let board = state.pipeline_api.load_board().await.unwrap();
        assert!(board.is_empty());
    }
}
