// ==========================================
// CRM 销售管道系统 - 看板状态
// ==========================================
// 分组: 阶段 → 商机列表（列内顺序 = 输入顺序按阶段过滤）
// 移动: 先改内存，再单字段持久化；持久化失败时仅回滚该商机
// 阶段之间无流转限制
// ==========================================

use crate::domain::{Deal, PipelineStage};
use crate::pipeline::error::{BoardError, BoardResult};
use crate::repository::DealStageStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// 移动结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// 目标阶段与当前相同，未发生持久化
    Unchanged,
    Moved {
        from: PipelineStage,
        to: PipelineStage,
    },
}

/// 单阶段汇总（分析看板数据源）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: PipelineStage,
    pub count: usize,
    /// 缺失金额按 0 计
    pub total_value: f64,
}

// ==========================================
// PipelineBoard
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PipelineBoard {
    deals: Vec<Deal>,
}

impl PipelineBoard {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self { deals }
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn find(&self, deal_id: &str) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == deal_id)
    }

    /// 按阶段分组；所有阶段都有对应的列（可能为空）
    pub fn columns(&self) -> BTreeMap<PipelineStage, Vec<&Deal>> {
        let mut columns: BTreeMap<PipelineStage, Vec<&Deal>> = PipelineStage::ALL
            .iter()
            .map(|stage| (*stage, Vec::new()))
            .collect();
        for deal in &self.deals {
            columns.entry(deal.stage).or_default().push(deal);
        }
        columns
    }

    pub fn column(&self, stage: PipelineStage) -> Vec<&Deal> {
        self.deals.iter().filter(|d| d.stage == stage).collect()
    }

    /// 移动商机到目标阶段
    ///
    /// # 返回
    /// - Ok(Unchanged): 阶段未变，不调用存储
    /// - Ok(Moved): 已移动并持久化
    /// - Err(DealNotFound): 看板中无此商机
    /// - Err(StoreWrite): 持久化失败，内存状态已回滚
    pub async fn move_deal(
        &mut self,
        deal_id: &str,
        target: PipelineStage,
        store: &dyn DealStageStore,
    ) -> BoardResult<MoveOutcome> {
        let index = self
            .deals
            .iter()
            .position(|d| d.id == deal_id)
            .ok_or_else(|| BoardError::DealNotFound(deal_id.to_string()))?;

        let previous = self.deals[index].stage;
        if previous == target {
            debug!(deal_id = %deal_id, stage = %target, "阶段未变化，忽略移动");
            return Ok(MoveOutcome::Unchanged);
        }

        self.deals[index].stage = target;

        match store.update_stage(deal_id, target).await {
            Ok(()) => {
                self.deals[index].updated_at = Utc::now();
                info!(deal_id = %deal_id, from = %previous, to = %target, "商机已移动");
                Ok(MoveOutcome::Moved {
                    from: previous,
                    to: target,
                })
            }
            Err(e) => {
                self.deals[index].stage = previous;
                warn!(deal_id = %deal_id, error = %e, "阶段保存失败，已回滚");
                Err(BoardError::StoreWrite {
                    deal_id: deal_id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// 各阶段数量与金额汇总（按阶段顺序）
    pub fn stage_summary(&self) -> Vec<StageSummary> {
        self.columns()
            .into_iter()
            .map(|(stage, deals)| StageSummary {
                stage,
                count: deals.len(),
                total_value: deals.iter().filter_map(|d| d.deal_value).sum(),
            })
            .collect()
    }
}
