// ==========================================
// CRM 销售管道系统 - 配置层
// ==========================================
// 职责: 系统配置管理（导入分页 / CSV 严格模式 / 编号策略 / 对账阈值）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_defaults, config_keys, AppConfig, ConfigManager};
pub use import_config_trait::ImportConfigReader;
