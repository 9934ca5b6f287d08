// ==========================================
// CRM 销售管道系统 - 导入层
// ==========================================
// 职责: CSV 解析 → 行映射 → 批量导入；导入撤销；中断导入对账
// 流程: CsvParser → RowMapper → BatchImporter → (RevertExecutor / ImportReconciler)
// ==========================================

// 模块声明
pub mod batch_importer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod reconcile;
pub mod revert;

// 重导出核心类型
pub use batch_importer::{BatchImporter, ImportOutcome, ImportRequest};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{
    DealRowMapper, LeadRowMapper, ProspectIdGenerator, ProspectIdStrategy, RowMapper,
};
pub use file_parser::{CsvParser, ParsedCsv, RawRow, SkippedRow};
pub use reconcile::{ImportReconciler, ReconciledImport};
pub use revert::{RevertExecutor, RevertOutcome};
