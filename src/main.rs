// ==========================================
// CRM 销售管道系统 - 命令行入口
// ==========================================
// 用法:
//   crm-pipeline import <file.csv> [leads|deals]
//   crm-pipeline history [leads|deals]
//   crm-pipeline revert <batch_id>
//   crm-pipeline board
//   crm-pipeline move <deal_id> <stage>
//   crm-pipeline reconcile
//
// 环境变量:
//   CRM_PIPELINE_USER_ID   当前用户（必填）
//   CRM_PIPELINE_DB_PATH   数据库路径（可选）
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use crm_pipeline::app::{get_default_db_path, AppState};
use crm_pipeline::auth::{AuthProvider, StaticAuthProvider};
use crm_pipeline::domain::{ImportType, PipelineStage, User};
use std::path::Path;
use std::sync::Arc;

const USAGE: &str = "用法: crm-pipeline <import|history|revert|board|move|reconcile> [参数...]";

#[tokio::main]
async fn main() -> Result<()> {
    crm_pipeline::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let auth: Arc<dyn AuthProvider> = match std::env::var("CRM_PIPELINE_USER_ID") {
        Ok(id) if !id.trim().is_empty() => Arc::new(StaticAuthProvider::new(User::new(id.trim()))),
        _ => Arc::new(StaticAuthProvider::anonymous()),
    };

    let db_path = get_default_db_path();
    tracing::info!(version = crm_pipeline::VERSION, db_path = %db_path, "{}", crm_pipeline::APP_NAME);
    let state = AppState::new(&db_path, auth).context("初始化失败")?;

    match command.as_str() {
        "import" => {
            let file = args.get(1).ok_or_else(|| anyhow!("缺少文件路径\n{}", USAGE))?;
            let import_type = parse_import_type(args.get(2))?;
            let response = state
                .import_api
                .import_file(Path::new(file), import_type)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "history" => {
            let import_type = parse_import_type(args.get(1))?;
            let page = state.import_api.list_import_history(import_type).await?;
            for view in page {
                println!(
                    "{}  {:<10} {:>6}  {}  {}{}",
                    view.record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    view.record.status,
                    view.record.record_count,
                    view.record.id,
                    view.record.file_name,
                    if view.can_revert { "  [可撤销]" } else { "" }
                );
            }
        }
        "revert" => {
            let batch_id = args.get(1).ok_or_else(|| anyhow!("缺少 batch_id\n{}", USAGE))?;
            let outcome = state.import_api.revert_import(batch_id).await?;
            println!("已撤销 {}，删除 {} 条记录", outcome.batch_id, outcome.deleted_count);
        }
        "board" => {
            let board = state.pipeline_api.load_board().await?;
            for (stage, deals) in board.columns() {
                println!("== {} ({})", stage, deals.len());
                for deal in deals {
                    println!(
                        "   {}  {}  {}",
                        deal.id,
                        deal.deal_name,
                        deal.deal_value.map(|v| format!("{:.2}", v)).unwrap_or_default()
                    );
                }
            }
        }
        "move" => {
            let deal_id = args.get(1).ok_or_else(|| anyhow!("缺少 deal_id\n{}", USAGE))?;
            let stage: PipelineStage = args
                .get(2)
                .ok_or_else(|| anyhow!("缺少目标阶段\n{}", USAGE))?
                .parse()?;
            let mut board = state.pipeline_api.load_board().await?;
            let outcome = state
                .pipeline_api
                .move_deal(&mut board, deal_id, stage)
                .await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        "reconcile" => {
            let swept = state.import_api.reconcile_stale_imports().await?;
            println!("已对账 {} 条中断的导入", swept.len());
            for item in swept {
                println!("   {}  {}  {}", item.history_id, item.status, item.record_count);
            }
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn parse_import_type(arg: Option<&String>) -> Result<ImportType> {
    match arg {
        None => Ok(ImportType::Leads),
        Some(s) => Ok(s.parse()?),
    }
}
