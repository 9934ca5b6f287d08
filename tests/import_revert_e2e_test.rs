// ==========================================
// 导入 / 撤销 端到端测试
// ==========================================
// 覆盖: 示例场景、upsert 幂等、撤销为导入的逆操作、不可撤销场景、
//       can_revert 派生、认证失败、列数不一致、严格模式、对账
// ==========================================

use crm_pipeline::api::ApiError;
use crm_pipeline::config::config_keys;
use crm_pipeline::domain::{ImportStatus, ImportType, PipelineStage};
use crm_pipeline::query::ListQuery;

mod test_helpers;
use test_helpers::{
    anonymous_app, app_for_user, create_test_db, insert_processing_history, load_history,
    write_csv, ACME_LEADS_CSV, KEYED_LEADS_CSV,
};

#[tokio::test]
async fn test_example_scenario_import_then_revert() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    // 步骤 1: 导入单行 CSV
    let response = app
        .import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await
        .unwrap();
    assert_eq!(response.record_count, 1);
    assert!(response.skipped_rows.is_empty());

    // 步骤 2: 校验映射结果
    let leads = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.business_name, "Acme Inc");
    assert_eq!(lead.contact_name, "John Smith");
    assert_eq!(lead.deal_value, Some(5000.0));
    assert!(lead.bf_interest && !lead.ct_interest && !lead.ba_interest);
    assert_eq!(lead.status, PipelineStage::New);
    assert!(lead.prospect_id.starts_with("LEAD-"));
    assert_eq!(lead.import_batch_id.as_deref(), Some(response.batch_id.as_str()));

    // 步骤 3: 导入历史为 completed 且可撤销
    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.status, ImportStatus::Completed);
    assert_eq!(history[0].record.record_count, 1);
    assert!(history[0].can_revert);

    // 步骤 4: 撤销
    let outcome = app.import_api.revert_import(&response.batch_id).await.unwrap();
    assert_eq!(outcome.deleted_count, 1);

    let leads = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert!(leads.is_empty());
    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(history[0].record.status, ImportStatus::Reverted);
    assert!(!history[0].can_revert);
}

#[tokio::test]
async fn test_reimport_is_idempotent_on_entity_count() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    app.import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();
    let second = app
        .import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();

    let leads = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(leads.len(), 3);
    assert_eq!(second.record_count, 3);
    assert!(leads
        .iter()
        .all(|l| l.import_batch_id.as_deref() == Some(second.batch_id.as_str())));

    // 只有最新的 completed 记录可撤销
    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    let flags: Vec<bool> = history.iter().map(|v| v.can_revert).collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_revert_deletes_exactly_imported_records() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let first = app
        .import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await
        .unwrap();
    let second = app
        .import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();

    let outcome = app.import_api.revert_import(&second.batch_id).await.unwrap();
    assert_eq!(outcome.deleted_count, 3);

    let remaining = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(
        remaining[0].import_batch_id.as_deref(),
        Some(first.batch_id.as_str())
    );
}

#[tokio::test]
async fn test_reverted_batch_cannot_be_reverted_again() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let response = app
        .import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();
    app.import_api.revert_import(&response.batch_id).await.unwrap();

    // 再导入一批，确认二次撤销不会误删
    app.import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await
        .unwrap();

    let result = app.import_api.revert_import(&response.batch_id).await;
    assert!(matches!(result, Err(ApiError::NotRevertible(_))));

    let remaining = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_other_user_cannot_revert_or_see_batch() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let owner = app_for_user(&db_path, "u1");
    let other = app_for_user(&db_path, "u2");

    let response = owner
        .import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();

    assert!(other
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap()
        .is_empty());
    let result = other.import_api.revert_import(&response.batch_id).await;
    assert!(matches!(result, Err(ApiError::NotRevertible(_))));

    let leads = owner.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(leads.len(), 3);
}

#[tokio::test]
async fn test_unauthenticated_import_persists_nothing() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let anonymous = anonymous_app(&db_path);

    let result = anonymous
        .import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await;
    let err = result.unwrap_err();
    assert!(err.requires_login());

    let app = app_for_user(&db_path, "u1");
    assert!(app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_missing_required_column_is_validation_error() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let result = app
        .import_api
        .import_csv(ImportType::Leads, "bad.csv", "business_name,city\nAcme,Austin\n")
        .await;
    match result {
        Err(ApiError::ValidationError(msg)) => assert!(msg.contains("contact_name")),
        other => panic!("expected ValidationError, got {:?}", other),
    }

    assert!(app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_header_only_csv_is_no_data() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let result = app
        .import_api
        .import_csv(ImportType::Leads, "empty.csv", "business_name,contact_name\n")
        .await;
    assert!(matches!(result, Err(ApiError::NoData)));
}

#[tokio::test]
async fn test_mismatched_rows_are_skipped_and_recorded() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let csv = "business_name,contact_name,city\nAcme,John,Austin\nGlobex,Hank\nInitech,Bill,Austin\n";
    let response = app
        .import_api
        .import_csv(ImportType::Leads, "ragged.csv", csv)
        .await
        .unwrap();

    assert_eq!(response.record_count, 2);
    assert_eq!(response.skipped_rows.len(), 1);
    assert_eq!(response.skipped_rows[0].line, 3);

    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(history[0].record.metadata["skipped_rows"], 1);
}

#[tokio::test]
async fn test_strict_columns_rejects_whole_file() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");
    app.config
        .set_global_config_value(config_keys::STRICT_COLUMNS, "true")
        .unwrap();

    let csv = "business_name,contact_name,city\nAcme,John,Austin\nGlobex,Hank\n";
    let result = app
        .import_api
        .import_csv(ImportType::Leads, "ragged.csv", csv)
        .await;
    assert!(matches!(result, Err(ApiError::ImportError(_))));

    let leads = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert!(leads.is_empty());
}

#[tokio::test]
async fn test_import_file_uses_file_name() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");
    let csv_file = write_csv(KEYED_LEADS_CSV);

    let response = app
        .import_api
        .import_file(csv_file.path(), ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(response.record_count, 3);

    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    let expected_name = csv_file
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert_eq!(history[0].record.file_name, expected_name);
}

#[tokio::test]
async fn test_history_page_size_is_configurable() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");
    app.config
        .set_global_config_value(config_keys::HISTORY_PAGE_SIZE, "2")
        .unwrap();

    for _ in 0..3 {
        app.import_api
            .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
            .await
            .unwrap();
    }

    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].can_revert);
    assert!(!history[1].can_revert);
}

#[tokio::test]
async fn test_reconcile_with_nothing_stale() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    app.import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await
        .unwrap();

    let swept = app.import_api.reconcile_stale_imports().await.unwrap();
    assert!(swept.is_empty());
}

#[tokio::test]
async fn test_older_completed_batch_is_not_revertible() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = app_for_user(&db_path, "u1");

    let first = app
        .import_api
        .import_csv(ImportType::Leads, "acme.csv", ACME_LEADS_CSV)
        .await
        .unwrap();
    app.import_api
        .import_csv(ImportType::Leads, "keyed.csv", KEYED_LEADS_CSV)
        .await
        .unwrap();

    let result = app.import_api.revert_import(&first.batch_id).await;
    assert!(matches!(result, Err(ApiError::NotRevertible(_))));

    let leads = app.pipeline_api.list_leads(&ListQuery::new()).await.unwrap();
    assert_eq!(leads.len(), 4);
    let history = app
        .import_api
        .list_import_history(ImportType::Leads)
        .await
        .unwrap();
    assert_eq!(history[1].record.status, ImportStatus::Completed);
}

#[tokio::test]
async fn test_reconcile_only_touches_current_users_records() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let owner_record = insert_processing_history(&db_path, "u2", 120).await;
    let mine = insert_processing_history(&db_path, "u1", 120).await;

    let app = app_for_user(&db_path, "u1");
    let swept = app.import_api.reconcile_stale_imports().await.unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].history_id, mine);

    let theirs = load_history(&db_path, &owner_record).await;
    assert_eq!(theirs.user_id, "u2");
    assert_eq!(theirs.status, ImportStatus::Processing);

    let mine = load_history(&db_path, &mine).await;
    assert_eq!(mine.status, ImportStatus::Failed);
}

#[tokio::test]
async fn test_reconcile_with_huge_threshold_does_not_panic() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    insert_processing_history(&db_path, "u1", 120).await;

    let app = app_for_user(&db_path, "u1");
    app.config
        .set_global_config_value(config_keys::STALE_AFTER_MINUTES, "1000000000000")
        .unwrap();

    let swept = app.import_api.reconcile_stale_imports().await.unwrap();
    assert!(swept.is_empty());
}
