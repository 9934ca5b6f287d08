// ==========================================
// CRM 销售管道系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: rusqlite 错误在此统一归类，上层只看到业务可区分的几类
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 连接 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("共享连接锁已失效: {0}")]
    LockError(String),

    // ===== 读写 =====
    #[error("{entity} 不存在: id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("SQL 执行失败: {0}")]
    DatabaseQueryError(String),

    /// 唯一键、主键、外键、NOT NULL 等约束被拒绝
    #[error("约束冲突: {0}")]
    UniqueConstraintViolation(String),

    // ===== 行解码 =====
    #[error("第 {column} 列无法解码: {message}")]
    ColumnDecodeError { column: usize, message: String },

    #[error("metadata_json 无法解析: {0}")]
    MetadataJsonError(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RepositoryError::UniqueConstraintViolation(
                    msg.unwrap_or_else(|| code.to_string()),
                )
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                RepositoryError::ColumnDecodeError {
                    column,
                    message: source.to_string(),
                }
            }
            rusqlite::Error::InvalidColumnType(column, name, ty) => {
                RepositoryError::ColumnDecodeError {
                    column,
                    message: format!("{} 的类型为 {}", name, ty),
                }
            }
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_is_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_no_rows_is_query_error() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::DatabaseQueryError(_)));
    }
}
