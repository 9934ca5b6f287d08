// ==========================================
// CRM 销售管道系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 除逐行 CSV 问题外，所有错误都上抛到触发操作
// ==========================================

use crate::domain::{ImportStatus, ImportType};
use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    /// 仅严格模式下出现；宽松模式跳过该行
    #[error("列数不一致 (行 {line}): 期望 {expected} 列，实际 {actual} 列")]
    ColumnCountMismatch {
        line: u64,
        expected: usize,
        actual: usize,
    },

    // ===== 数据校验错误 =====
    #[error("必填字段缺失: {}", missing.join(", "))]
    ValidationError { missing: Vec<String> },

    #[error("没有可导入的数据")]
    NoData,

    // ===== 存储错误 =====
    #[error("存储写入失败: {0}")]
    StoreWriteError(#[source] RepositoryError),

    // ===== 撤销错误 =====
    #[error("批次不可撤销 (batch_id={batch_id}): {reason}")]
    NotRevertible { batch_id: String, reason: String },

    #[error("不支持的导入类型: {0}")]
    UnsupportedImportType(ImportType),

    // ===== 对账错误 =====
    #[error("超时阈值超出可表示范围: {0} 分钟")]
    StaleThresholdOutOfRange(i64),
}

impl ImportError {
    pub fn not_revertible(batch_id: &str, reason: impl Into<String>) -> Self {
        ImportError::NotRevertible {
            batch_id: batch_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_revertible_status(batch_id: &str, status: ImportStatus) -> Self {
        Self::not_revertible(batch_id, format!("当前状态为 {}，仅 completed 可撤销", status))
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::StoreWriteError(err)
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
