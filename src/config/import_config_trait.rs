// ==========================================
// CRM 销售管道系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::ProspectIdStrategy;
use crate::repository::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 配置缺失或格式错误时返回默认值，只有数据库错误才返回 Err
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 导入历史每页条数
    ///
    /// # 默认值
    /// - 10
    async fn get_history_page_size(&self) -> RepositoryResult<usize>;

    /// 是否严格校验 CSV 列数
    ///
    /// # 返回
    /// - false: 列数不一致的行跳过并告警
    /// - true: 任一行列数不一致则整个文件拒绝
    ///
    /// # 默认值
    /// - false
    async fn get_strict_columns(&self) -> RepositoryResult<bool>;

    /// 缺失业务标识时的生成策略
    ///
    /// # 默认值
    /// - checked
    async fn get_prospect_id_strategy(&self) -> RepositoryResult<ProspectIdStrategy>;

    /// processing 记录超过多少分钟视为中断
    ///
    /// # 默认值
    /// - 30
    async fn get_stale_after_minutes(&self) -> RepositoryResult<i64>;
}
