// ==========================================
// CRM 销售管道系统 - 看板错误类型
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("看板中不存在该商机: {0}")]
    DealNotFound(String),

    /// 持久化失败；内存中的移动已回滚
    #[error("商机阶段保存失败 (deal_id={deal_id}): {source}")]
    StoreWrite {
        deal_id: String,
        #[source]
        source: RepositoryError,
    },
}

pub type BoardResult<T> = Result<T, BoardError>;
