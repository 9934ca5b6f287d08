// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、应用状态、CSV 文件等
// ==========================================
#![allow(dead_code)]

use crm_pipeline::app::AppState;
use crm_pipeline::auth::{AuthProvider, StaticAuthProvider};
use crm_pipeline::db::{ensure_schema, open_sqlite_connection};
use crm_pipeline::domain::{ImportHistory, ImportType, User};
use crm_pipeline::repository::{ImportHistoryRepositoryImpl, ImportHistoryStore};
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 单行线索 CSV（Acme 示例）
pub const ACME_LEADS_CSV: &str =
    "business_name,contact_name,deal_value,bf_interest\nAcme Inc,John Smith,5000,true\n";

/// 带显式 prospect_id 的线索 CSV（可重复导入）
pub const KEYED_LEADS_CSV: &str = "\
prospect_id,business_name,contact_name,city,deal_value,ct_interest
P-001,Acme Inc,John Smith,Austin,5000,yes
P-002,Globex,Hank Scorpio,Cypress Creek,12000,no
P-003,Initech,Bill Lumbergh,Austin,,TRUE
";

/// 商机 CSV
pub const DEALS_CSV: &str = "\
prospect_id,deal_name,business_name,deal_value,stage
D-001,Website redesign,Acme Inc,5000,New
D-002,Annual contract,Globex,12000,Qualified
D-003,Pilot,Initech,800,New
D-004,Renewal,Umbrella,3000,Deal Closed
";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    crm_pipeline::logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 以指定用户打开应用状态
pub fn app_for_user(db_path: &str, user_id: &str) -> AppState {
    let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::new(User::new(user_id)));
    AppState::new(db_path, auth).expect("初始化 AppState 失败")
}

/// 未登录的应用状态
pub fn anonymous_app(db_path: &str) -> AppState {
    let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::anonymous());
    AppState::new(db_path, auth).expect("初始化 AppState 失败")
}

/// 写入临时 CSV 文件
pub fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时 CSV 失败");
    file.write_all(contents.as_bytes()).expect("写入 CSV 失败");
    file
}

/// 直接写入一条 processing 导入历史（模拟中途中断的导入）
pub async fn insert_processing_history(db_path: &str, user_id: &str, minutes_ago: i64) -> String {
    let conn = open_sqlite_connection(db_path).expect("打开数据库失败");
    let repo = ImportHistoryRepositoryImpl::new(Arc::new(Mutex::new(conn)));
    let created_at = chrono::Utc::now() - chrono::Duration::minutes(minutes_ago);
    repo.insert(ImportHistory::processing(
        user_id,
        ImportType::Leads,
        "interrupted.csv",
        2,
        created_at,
    ))
    .await
    .expect("写入导入历史失败")
}

/// 按 ID 读取导入历史
pub async fn load_history(db_path: &str, id: &str) -> ImportHistory {
    let conn = open_sqlite_connection(db_path).expect("打开数据库失败");
    let repo = ImportHistoryRepositoryImpl::new(Arc::new(Mutex::new(conn)));
    repo.find_by_id(id)
        .await
        .expect("查询导入历史失败")
        .expect("导入历史不存在")
}
