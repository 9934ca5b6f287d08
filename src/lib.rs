// ==========================================
// CRM 销售管道系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 核心: CSV 批量导入 / 导入撤销 / 销售看板阶段流转
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - CSV 导入 / 撤销 / 对账
pub mod importer;

// 看板层 - 阶段分组与移动
pub mod pipeline;

// 列表查询 - 搜索 / 过滤 / 排序
pub mod query;

// 配置层 - 系统配置
pub mod config;

// 认证层 - 当前用户与会话刷新
pub mod auth;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    Deal, ImportHistory, ImportHistoryView, ImportStatus, ImportType, Lead, PipelineStage, User,
};

// 导入
pub use importer::{ImportError, ImportResult};

// 看板
pub use pipeline::{BoardError, PipelineBoard};

// API
pub use api::{ApiError, ApiResult, ImportApi, PipelineApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "CRM 销售管道系统";
