// ==========================================
// CRM 销售管道系统 - SQLite 连接与建表
// ==========================================
// 所有连接（CLI / AppState / 测试）都经过这里打开，
// 保证 PRAGMA 与 schema 一致
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 写锁等待上限；CLI 与后台对账可能同时写同一个库文件
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// schema 版本号，表结构变化时递增
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 连接级 PRAGMA（SQLite 不持久化这两项，每个连接都要设置）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

/// 按路径打开；":memory:" 得到内存库
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库（已建表），供测试与演示使用
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 幂等建表
///
/// 表:
/// - leads / deals: 业务实体，prospect_id 作为 upsert 冲突键
/// - import_history: 导入批次审计日志
/// - config_kv: 全局配置
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_history (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            import_type TEXT NOT NULL,
            file_name TEXT NOT NULL,
            record_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_import_history_user_type
            ON import_history (user_id, import_type, created_at);

        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            prospect_id TEXT NOT NULL UNIQUE,
            business_name TEXT NOT NULL,
            contact_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            city TEXT,
            deal_value REAL,
            bf_interest INTEGER NOT NULL DEFAULT 0,
            ct_interest INTEGER NOT NULL DEFAULT 0,
            ba_interest INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            notes TEXT,
            import_batch_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_leads_batch ON leads (import_batch_id);

        CREATE TABLE IF NOT EXISTS deals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            prospect_id TEXT NOT NULL UNIQUE,
            deal_name TEXT NOT NULL,
            business_name TEXT NOT NULL,
            contact_name TEXT,
            deal_value REAL,
            stage TEXT NOT NULL,
            expected_close_date TEXT,
            notes TEXT,
            import_batch_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_deals_batch ON deals (import_batch_id);
        CREATE INDEX IF NOT EXISTS idx_deals_user ON deals (user_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 已写入的最高 schema 版本；未建表时为 None
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if exists {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
    } else {
        Ok(None)
    }
}
