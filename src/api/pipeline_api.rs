// ==========================================
// CRM 销售管道系统 - 看板与列表API
// ==========================================
// 职责: 加载看板、移动商机、线索/商机列表查询
// ==========================================

use crate::api::error::ApiResult;
use crate::auth::{require_user, AuthProvider};
use crate::domain::{Deal, Lead, PipelineStage};
use crate::pipeline::{MoveOutcome, PipelineBoard, StageSummary};
use crate::query::ListQuery;
use crate::repository::{DealRepository, EntityStore, LeadRepository};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 看板与列表API
pub struct PipelineApi {
    auth: Arc<dyn AuthProvider>,
    leads: Arc<LeadRepository>,
    deals: Arc<DealRepository>,
}

impl PipelineApi {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        leads: Arc<LeadRepository>,
        deals: Arc<DealRepository>,
    ) -> Self {
        Self { auth, leads, deals }
    }

    /// 加载当前用户的看板（按创建顺序）
    pub async fn load_board(&self) -> ApiResult<PipelineBoard> {
        let user = require_user(self.auth.as_ref()).await?;
        let deals = self.deals.find_by_user(&user.id).await?;
        debug!(user_id = %user.id, count = deals.len(), "看板已加载");
        Ok(PipelineBoard::new(deals))
    }

    /// 移动商机；失败时看板内该商机已回滚
    #[instrument(skip(self, board))]
    pub async fn move_deal(
        &self,
        board: &mut PipelineBoard,
        deal_id: &str,
        stage: PipelineStage,
    ) -> ApiResult<MoveOutcome> {
        require_user(self.auth.as_ref()).await?;
        Ok(board.move_deal(deal_id, stage, self.deals.as_ref()).await?)
    }

    /// 各阶段数量与金额汇总
    pub async fn stage_summary(&self) -> ApiResult<Vec<StageSummary>> {
        Ok(self.load_board().await?.stage_summary())
    }

    pub async fn list_leads(&self, query: &ListQuery) -> ApiResult<Vec<Lead>> {
        let user = require_user(self.auth.as_ref()).await?;
        let leads = self.leads.find_by_user(&user.id).await?;
        Ok(query.apply(leads))
    }

    pub async fn list_deals(&self, query: &ListQuery) -> ApiResult<Vec<Deal>> {
        let user = require_user(self.auth.as_ref()).await?;
        let deals = self.deals.find_by_user(&user.id).await?;
        Ok(query.apply(deals))
    }
}
