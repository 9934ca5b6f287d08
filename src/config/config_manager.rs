// ==========================================
// CRM 销售管道系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::ProspectIdStrategy;
use crate::repository::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入历史
    pub const HISTORY_PAGE_SIZE: &str = "import.history_page_size";

    // CSV 解析
    pub const STRICT_COLUMNS: &str = "import.strict_columns";

    // 业务标识生成
    pub const PROSPECT_ID_STRATEGY: &str = "import.prospect_id_strategy";

    // 中断导入对账
    pub const STALE_AFTER_MINUTES: &str = "import.stale_after_minutes";
}

/// 默认值
pub mod config_defaults {
    pub const HISTORY_PAGE_SIZE: usize = 10;
    pub const STRICT_COLUMNS: bool = false;
    pub const STALE_AFTER_MINUTES: i64 = 30;

    /// 对账阈值上限（一年）
    pub const MAX_STALE_AFTER_MINUTES: i64 = 365 * 24 * 60;
}

// ==========================================
// AppConfig - 配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub history_page_size: usize,
    pub strict_columns: bool,
    pub prospect_id_strategy: ProspectIdStrategy,
    pub stale_after_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_page_size: config_defaults::HISTORY_PAGE_SIZE,
            strict_columns: config_defaults::STRICT_COLUMNS,
            prospect_id_strategy: ProspectIdStrategy::default(),
            stale_after_minutes: config_defaults::STALE_AFTER_MINUTES,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        debug!(config_key = %key, value = %value, "配置已更新");
        Ok(())
    }

    /// 全部 global 配置（按键排序）
    pub fn list_global_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 读取并解析配置；缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(config_key = %key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 加载配置快照
    pub async fn load_app_config(&self) -> RepositoryResult<AppConfig> {
        Ok(AppConfig {
            history_page_size: self.get_history_page_size().await?,
            strict_columns: self.get_strict_columns().await?,
            prospect_id_strategy: self.get_prospect_id_strategy().await?,
            stale_after_minutes: self.get_stale_after_minutes().await?,
        })
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_history_page_size(&self) -> RepositoryResult<usize> {
        let size = self.get_parsed_or_default(
            config_keys::HISTORY_PAGE_SIZE,
            config_defaults::HISTORY_PAGE_SIZE,
        )?;
        Ok(if size == 0 {
            config_defaults::HISTORY_PAGE_SIZE
        } else {
            size
        })
    }

    async fn get_strict_columns(&self) -> RepositoryResult<bool> {
        self.get_parsed_or_default(config_keys::STRICT_COLUMNS, config_defaults::STRICT_COLUMNS)
    }

    async fn get_prospect_id_strategy(&self) -> RepositoryResult<ProspectIdStrategy> {
        self.get_parsed_or_default(
            config_keys::PROSPECT_ID_STRATEGY,
            ProspectIdStrategy::default(),
        )
    }

    async fn get_stale_after_minutes(&self) -> RepositoryResult<i64> {
        let minutes = self.get_parsed_or_default(
            config_keys::STALE_AFTER_MINUTES,
            config_defaults::STALE_AFTER_MINUTES,
        )?;
        if minutes > config_defaults::MAX_STALE_AFTER_MINUTES {
            warn!(
                minutes,
                max = config_defaults::MAX_STALE_AFTER_MINUTES,
                "对账阈值过大，已按上限处理"
            );
        }
        Ok(minutes.clamp(1, config_defaults::MAX_STALE_AFTER_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = setup().load_app_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.history_page_size, 10);
        assert!(!config.strict_columns);
        assert_eq!(config.prospect_id_strategy, ProspectIdStrategy::Checked);
        assert_eq!(config.stale_after_minutes, 30);
    }

    #[tokio::test]
    async fn test_overrides_are_read() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::HISTORY_PAGE_SIZE, "25")
            .unwrap();
        manager
            .set_global_config_value(config_keys::STRICT_COLUMNS, "true")
            .unwrap();
        manager
            .set_global_config_value(config_keys::PROSPECT_ID_STRATEGY, "uuid")
            .unwrap();

        let config = manager.load_app_config().await.unwrap();
        assert_eq!(config.history_page_size, 25);
        assert!(config.strict_columns);
        assert_eq!(config.prospect_id_strategy, ProspectIdStrategy::Uuid);
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back_to_default() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::HISTORY_PAGE_SIZE, "lots")
            .unwrap();
        manager
            .set_global_config_value(config_keys::PROSPECT_ID_STRATEGY, "sequence")
            .unwrap();

        assert_eq!(manager.get_history_page_size().await.unwrap(), 10);
        assert_eq!(
            manager.get_prospect_id_strategy().await.unwrap(),
            ProspectIdStrategy::Checked
        );
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let manager = setup();
        manager.set_global_config_value("k", "1").unwrap();
        manager.set_global_config_value("k", "2").unwrap();

        let all = manager.list_global_config().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["k"], "2");
    }

    #[tokio::test]
    async fn test_stale_after_minutes_is_clamped() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::STALE_AFTER_MINUTES, "1000000000000")
            .unwrap();
        assert_eq!(
            manager.get_stale_after_minutes().await.unwrap(),
            config_defaults::MAX_STALE_AFTER_MINUTES
        );

        manager
            .set_global_config_value(config_keys::STALE_AFTER_MINUTES, "-5")
            .unwrap();
        assert_eq!(manager.get_stale_after_minutes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_app_config_serializes_strategy_as_config_value() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::PROSPECT_ID_STRATEGY, "uuid")
            .unwrap();

        let config = manager.load_app_config().await.unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["prospect_id_strategy"], "uuid");
        assert_eq!(json["stale_after_minutes"], 30);
    }
}
