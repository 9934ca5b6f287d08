// ==========================================
// CRM 销售管道系统 - 销售看板
// ==========================================
// 职责: 按阶段分组商机，支持拖拽移动并持久化
// 红线: 商机列表是唯一可变状态，分组视图每次按需派生
// ==========================================

pub mod board;
pub mod error;

pub use board::{MoveOutcome, PipelineBoard, StageSummary};
pub use error::{BoardError, BoardResult};
