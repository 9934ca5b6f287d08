// ==========================================
// CRM 销售管道系统 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为可直接展示给用户的错误消息
// 约定: 认证类错误单独成类，调用方据此跳转登录
// ==========================================

use crate::auth::AuthError;
use crate::importer::ImportError;
use crate::pipeline::BoardError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 认证错误
    // ==========================================
    #[error("认证失败: {0}")]
    Unauthorized(#[from] AuthError),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("没有可导入的数据")]
    NoData,

    #[error("导入批次不可撤销: {0}")]
    NotRevertible(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    /// 写入失败；看板移动已回滚，导入历史已标记 failed
    #[error("保存失败: {0}")]
    StoreWriteError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 是否需要重新登录
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::StoreWriteError(format!("唯一键冲突: {}", msg))
            }
            err @ (RepositoryError::ColumnDecodeError { .. }
            | RepositoryError::MetadataJsonError(_)) => ApiError::InternalError(err.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::NoData => ApiError::NoData,
            ImportError::ValidationError { .. } => ApiError::ValidationError(err.to_string()),
            ImportError::NotRevertible { .. } => ApiError::NotRevertible(err.to_string()),
            ImportError::StoreWriteError(e) => ApiError::StoreWriteError(e.to_string()),
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件 {}", path)),
            ImportError::UnsupportedImportType(t) => {
                ApiError::InvalidInput(format!("不支持的导入类型: {}", t))
            }
            ImportError::StaleThresholdOutOfRange(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::FileReadError(_)
            | ImportError::CsvParseError(_)
            | ImportError::ColumnCountMismatch { .. } => ApiError::ImportError(err.to_string()),
        }
    }
}

// ==========================================
// 从 BoardError 转换
// ==========================================
impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::DealNotFound(id) => ApiError::NotFound(format!("商机(id={})", id)),
            BoardError::StoreWrite { .. } => ApiError::StoreWriteError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
