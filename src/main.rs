// ==========================================
// 客户档案管理系统 - 命令行入口
// ==========================================
// 用法:
//   customer-registry import <file>     批量导入 (.xlsx / .xls / .csv)
//   customer-registry list              列出全部客户
//   customer-registry batches [limit]   最近的导入批次
//   customer-registry config            当前配置快照
// 数据库: CUSTOMER_REGISTRY_DB_PATH 或用户数据目录
// ==========================================

use std::process::ExitCode;

use customer_registry::api::ApiError;
use customer_registry::app::{get_default_db_path, AppState};
use serde::Serialize;

const USAGE: &str = "用法: customer-registry <import <file> | list | batches [limit] | config>";

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("序列化失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    customer_registry::logging::init();

    tracing::info!(
        version = customer_registry::VERSION,
        "{} 启动",
        customer_registry::APP_NAME
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match (command.as_str(), args.get(1)) {
        ("import", Some(file)) => match state.import_api.import_customers(file).await {
            Ok(response) => print_json(&response),
            Err(ApiError::ImportRejected { message, response }) => {
                eprintln!("{}", message);
                print_json(&response);
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        ("list", None) => match state.customer_api.list_customers().await {
            Ok(customers) => print_json(&customers),
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        ("batches", limit) => {
            let limit = match limit.map(|l| l.parse::<usize>()) {
                None => 20,
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    eprintln!("{}", USAGE);
                    return ExitCode::from(2);
                }
            };
            match state.import_api.recent_batches(limit) {
                Ok(batches) => print_json(&batches),
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        ("config", None) => match state.config_manager.get_config_snapshot() {
            Ok(snapshot) => {
                println!("{}", snapshot);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("{}", USAGE);
            ExitCode::from(2)
        }
    }
}
