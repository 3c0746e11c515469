// ==========================================
// ImportApi 端到端测试
// ==========================================
// 测试目标: AppState → ImportApi → BatchCoordinator → SQLite
// 覆盖: 文件类型检查、部分失败响应、整批拒绝、配置读取、批次记录
// ==========================================

mod test_helpers;

use customer_registry::api::ApiError;
use customer_registry::app::AppState;
use customer_registry::config::config_keys;
use customer_registry::domain::{ImportStatus, RowOutcome, ValidationRule};
use tempfile::{tempdir, TempDir};
use test_helpers::{write_csv, write_raw};

fn create_state(dir: &TempDir) -> AppState {
    let db_path = dir.path().join("registry.db").to_string_lossy().to_string();
    AppState::new(db_path).unwrap()
}

#[tokio::test]
async fn test_unsupported_extension_is_invalid_input() {
    let dir = tempdir().unwrap();
    let state = create_state(&dir);
    let file = write_raw(&dir, "customers.txt", "Name,Date of Birth,NIC", &["A,1990-01-01,A1"]);

    let err = state
        .import_api
        .import_customers(&file.to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(state.import_api.recent_batches(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_failure_is_ok_with_failure_count() {
    let dir = tempdir().unwrap();
    let state = create_state(&dir);
    let file = write_csv(
        &dir,
        "customers.csv",
        &[
            "Alice,1990-01-01,A1,,,,,",
            "Bob,1985-05-05,A1,,,,,",
            "Carol,1980-01-01,C1,,,,,row:2",
        ],
    );

    let response = state
        .import_api
        .import_customers(&file.to_string_lossy())
        .await
        .unwrap();

    assert_eq!(response.status, ImportStatus::CompletedWithFailures);
    assert_eq!(response.total_records, 3);
    assert_eq!(response.success_count, 2);
    assert_eq!(response.failure_count, 1);
    assert!(response.message.is_some());

    // JSON 契约: camelCase + 逐行明细
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["totalRecords"], 3);
    assert_eq!(json["successCount"], 2);
    assert_eq!(json["failureCount"], 1);
    assert_eq!(json["rows"].as_array().unwrap().len(), 3);
    assert_eq!(json["rows"][1]["rowNumber"], 3);

    // 批次记录
    let batches = state.import_api.recent_batches(10).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_id, response.batch_id);
    assert_eq!(batches[0].file_name.as_deref(), Some("customers.csv"));
    assert_eq!(batches[0].failure_count, 1);

    // 导入结果可由客户 API 读取（Carol 列出 Alice，Alice 读取时可见 Carol）
    let customers = state.customer_api.list_customers().await.unwrap();
    assert_eq!(customers.len(), 2);
    let alice = customers.iter().find(|c| c.nic == "A1").unwrap();
    let carol = customers.iter().find(|c| c.nic == "C1").unwrap();
    assert_eq!(alice.family_member_ids, vec![carol.id.unwrap()]);
}

#[tokio::test]
async fn test_unreadable_file_is_import_rejected() {
    let dir = tempdir().unwrap();
    let state = create_state(&dir);
    let missing = dir.path().join("missing.csv");

    let err = state
        .import_api
        .import_customers(&missing.to_string_lossy())
        .await
        .unwrap_err();

    match err {
        ApiError::ImportRejected { message, response } => {
            assert!(!message.is_empty());
            assert_eq!(response.status, ImportStatus::Rejected);
            assert_eq!(response.total_records, 0);
        }
        other => panic!("expected ImportRejected, got {:?}", other),
    }

    let batches = state.import_api.recent_batches(10).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].status, ImportStatus::Rejected);
}

#[tokio::test]
async fn test_validation_mode_read_from_config() {
    let dir = tempdir().unwrap();
    let state = create_state(&dir);
    state
        .config_manager
        .set_config_value(config_keys::VALIDATION_MODE, "FAIL_FAST")
        .unwrap();

    let file = write_csv(&dir, "bad.csv", &["Alice,2999-01-01,A1,,,3,,"]);
    let response = state
        .import_api
        .import_customers(&file.to_string_lossy())
        .await
        .unwrap();

    match &response.rows[0].outcome {
        RowOutcome::ValidationFailed { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].rule, ValidationRule::DateOfBirthInFuture);
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_config_is_invalid_input() {
    let dir = tempdir().unwrap();
    let state = create_state(&dir);
    state
        .config_manager
        .set_config_value(config_keys::STORE_TIMEOUT_MS, "soon")
        .unwrap();

    let file = write_csv(&dir, "ok.csv", &["Alice,1990-01-01,A1,,,,,"]);
    let err = state
        .import_api
        .import_customers(&file.to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
