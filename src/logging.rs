// ==========================================
// CRM 销售管道系统 - 日志
// ==========================================
// 输出: stderr，保留 stdout 给 CLI 的结果输出
// 过滤: RUST_LOG 优先，否则使用 DEFAULT_DIRECTIVES
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 默认过滤指令：本 crate 记录 info，依赖只记录 warn
pub const DEFAULT_DIRECTIVES: &str = "warn,crm_pipeline=info";

/// 设置后输出单行 JSON（便于日志采集）
pub const JSON_ENV: &str = "CRM_PIPELINE_LOG_JSON";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn json_requested() -> bool {
    std::env::var(JSON_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// 安装全局 subscriber；已安装时静默返回
///
/// ```no_run
/// crm_pipeline::logging::init();
/// tracing::info!(batch_id = "b-1", "导入开始");
/// ```
pub fn init() {
    let builder = fmt()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    let installed = if json_requested() {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };
    if installed.is_err() {
        tracing::debug!("日志 subscriber 已存在，跳过初始化");
    }
}

/// 测试用：debug 级别，输出交给 libtest 捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}
