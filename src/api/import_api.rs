// ==========================================
// CRM 销售管道系统 - 导入API
// ==========================================
// 职责: 封装 CSV 导入 / 导入历史 / 撤销 / 对账
// 流程: 认证 → 读配置 → 解析 → 映射 → 批量导入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::auth::{require_user, AuthProvider};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::{derive_revert_flags, ImportHistoryView, ImportType};
use crate::importer::{
    BatchImporter, CsvParser, DealRowMapper, ImportOutcome, ImportReconciler, ImportRequest,
    LeadRowMapper, ParsedCsv, ProspectIdGenerator, ProspectIdStrategy, ReconciledImport,
    RevertExecutor, RevertOutcome, RowMapper, SkippedRow,
};
use crate::repository::{
    BatchStoreRegistry, DealRepository, EntityStore, ImportHistoryRepositoryImpl,
    ImportHistoryStore, LeadRepository,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// 导入API响应
#[derive(Debug, Clone, Serialize)]
pub struct ImportApiResponse {
    /// 导入批次ID（即导入历史ID）
    pub batch_id: String,
    pub import_type: ImportType,
    /// 实际插入/更新的记录数
    pub record_count: usize,
    /// 解析阶段跳过的行
    pub skipped_rows: Vec<SkippedRow>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi {
    auth: Arc<dyn AuthProvider>,
    config: Arc<ConfigManager>,
    history: Arc<ImportHistoryRepositoryImpl>,
    leads: Arc<LeadRepository>,
    deals: Arc<DealRepository>,
}

impl ImportApi {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        config: Arc<ConfigManager>,
        history: Arc<ImportHistoryRepositoryImpl>,
        leads: Arc<LeadRepository>,
        deals: Arc<DealRepository>,
    ) -> Self {
        Self {
            auth,
            config,
            history,
            leads,
            deals,
        }
    }

    fn batch_stores(&self) -> BatchStoreRegistry {
        BatchStoreRegistry::new()
            .with_store(self.leads.clone())
            .with_store(self.deals.clone())
    }

    /// 导入 CSV 文本
    ///
    /// # 参数
    /// - import_type: 实体种类
    /// - file_name: 展示用文件名（写入导入历史）
    /// - csv_text: CSV 原文
    ///
    /// # 返回
    /// - Err(Unauthorized): 未登录或会话无法刷新，未写入任何数据
    /// - Err(ValidationError): 必填字段缺失
    /// - Err(NoData): 没有数据行
    /// - Err(StoreWriteError): 写入失败（导入历史已标记 failed）
    #[instrument(skip(self, csv_text), fields(bytes = csv_text.len()))]
    pub async fn import_csv(
        &self,
        import_type: ImportType,
        file_name: &str,
        csv_text: &str,
    ) -> ApiResult<ImportApiResponse> {
        let user = require_user(self.auth.as_ref()).await?;
        let config = self.config.load_app_config().await?;

        let parsed = CsvParser::new(config.strict_columns).parse_str(csv_text)?;
        self.import_parsed(&user.id, import_type, file_name, parsed, config.prospect_id_strategy)
            .await
    }

    /// 导入 CSV 文件（文件名取路径最后一段）
    #[instrument(skip(self))]
    pub async fn import_file(
        &self,
        path: &Path,
        import_type: ImportType,
    ) -> ApiResult<ImportApiResponse> {
        let user = require_user(self.auth.as_ref()).await?;
        let config = self.config.load_app_config().await?;

        let parsed = CsvParser::new(config.strict_columns).parse_file(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.import_parsed(&user.id, import_type, &file_name, parsed, config.prospect_id_strategy)
            .await
    }

    async fn import_parsed(
        &self,
        user_id: &str,
        import_type: ImportType,
        file_name: &str,
        parsed: ParsedCsv,
        strategy: ProspectIdStrategy,
    ) -> ApiResult<ImportApiResponse> {
        let start = Instant::now();
        if parsed.rows.is_empty() {
            return Err(ApiError::NoData);
        }

        let outcome = match import_type {
            ImportType::Leads => {
                self.run_import(self.leads.as_ref(), &LeadRowMapper, user_id, file_name, &parsed, strategy)
                    .await?
            }
            ImportType::Deals => {
                self.run_import(self.deals.as_ref(), &DealRowMapper, user_id, file_name, &parsed, strategy)
                    .await?
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as i64;
        info!(
            batch_id = %outcome.batch_id,
            record_count = outcome.record_count,
            elapsed_ms,
            "CSV 导入完成"
        );

        Ok(ImportApiResponse {
            batch_id: outcome.batch_id,
            import_type,
            record_count: outcome.record_count,
            skipped_rows: parsed.skipped,
            elapsed_ms,
        })
    }

    async fn run_import<S, M>(
        &self,
        store: &S,
        mapper: &M,
        user_id: &str,
        file_name: &str,
        parsed: &ParsedCsv,
        strategy: ProspectIdStrategy,
    ) -> ApiResult<ImportOutcome>
    where
        S: EntityStore,
        M: RowMapper<Record = S::Record>,
    {
        let existing = if strategy.needs_existing_ids() {
            store.existing_prospect_ids().await?
        } else {
            HashSet::new()
        };
        let mut ids = ProspectIdGenerator::new(strategy, existing);
        let records = mapper.map_rows(&parsed.rows, user_id, &mut ids)?;

        let request =
            ImportRequest::new(user_id, file_name).with_skipped_rows(parsed.skipped.len());
        let outcome = BatchImporter::new(self.history.clone())
            .import(store, records, request)
            .await?;
        Ok(outcome)
    }

    /// 当前用户某类型最近的导入记录（最新在前，含 can_revert）
    pub async fn list_import_history(
        &self,
        import_type: ImportType,
    ) -> ApiResult<Vec<ImportHistoryView>> {
        let user = require_user(self.auth.as_ref()).await?;
        let page_size = self.config.get_history_page_size().await?;

        let page = self
            .history
            .list_recent(&user.id, import_type, page_size)
            .await?;
        Ok(derive_revert_flags(page))
    }

    /// 撤销导入批次
    #[instrument(skip(self))]
    pub async fn revert_import(&self, batch_id: &str) -> ApiResult<RevertOutcome> {
        let user = require_user(self.auth.as_ref()).await?;

        let executor = RevertExecutor::new(self.history.clone(), self.batch_stores());
        Ok(executor.revert(&user.id, batch_id).await?)
    }

    /// 清理当前用户中断的导入（processing 超时）
    pub async fn reconcile_stale_imports(&self) -> ApiResult<Vec<ReconciledImport>> {
        let user = require_user(self.auth.as_ref()).await?;
        let minutes = self.config.get_stale_after_minutes().await?;

        let reconciler =
            ImportReconciler::with_minutes(self.history.clone(), self.batch_stores(), minutes)?;
        Ok(reconciler.sweep(&user.id, Utc::now()).await?)
    }
}
