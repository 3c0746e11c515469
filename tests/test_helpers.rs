// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、CSV 文件生成、测试数据构造
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use customer_registry::config::ImportConfig;
use customer_registry::domain::{CustomerRecord, ImportRow};
use customer_registry::repository::SqliteCustomerRepository;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// 标准表头
pub const HEADER: &str =
    "Name,Date of Birth,NIC,Mobile Numbers,Address Line 1,City ID,Country ID,Family Members";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = customer_registry::db::open_sqlite_connection(&db_path)?;
    customer_registry::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接并创建客户仓储
pub fn open_repo(db_path: &str) -> Arc<SqliteCustomerRepository> {
    let conn = customer_registry::db::open_sqlite_connection(db_path).unwrap();
    customer_registry::db::init_schema(&conn).unwrap();
    Arc::new(SqliteCustomerRepository::from_connection(Arc::new(Mutex::new(conn))))
}

/// 测试用导入配置（固定“今天”）
pub fn test_config() -> ImportConfig {
    ImportConfig::default().with_as_of(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

/// 超时测试用配置（超时缩短到 500ms）
pub fn fast_timeout_config() -> ImportConfig {
    test_config().with_store_timeout_ms(500)
}

/// 在临时目录写入 CSV 文件（自动加标准表头）
pub fn write_csv(dir: &TempDir, name: &str, rows: &[&str]) -> PathBuf {
    write_raw(dir, name, HEADER, rows)
}

/// 在临时目录写入任意表头的文件
pub fn write_raw(dir: &TempDir, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", header).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    path
}

/// 构造导入行（行号从 2 开始，对应表头下第一行）
pub fn import_rows(rows: &[&[(&str, &str)]]) -> Vec<ImportRow> {
    rows.iter()
        .enumerate()
        .map(|(i, cells)| {
            ImportRow::new(
                i + 2,
                cells
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            )
        })
        .collect()
}

/// 构造一条合法客户记录
pub fn customer(name: &str, nic: &str) -> CustomerRecord {
    CustomerRecord {
        id: None,
        name: name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        nic: nic.to_string(),
        mobile_numbers: vec!["0771234567".to_string()],
        addresses: vec![],
        family_member_ids: BTreeSet::new(),
    }
}
