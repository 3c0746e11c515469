// ==========================================
// 客户档案管理系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 行号: 与表格一致（表头为第 1 行，数据从第 2 行开始）；
//       空白行跳过但保留编号；CSV 取记录起始行号
// ==========================================

use crate::domain::import::ImportRow;
use crate::importer::customer_importer_trait::FileParser;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// 支持的扩展名（小写）
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// 提取小写扩展名
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 按表头组装一行；短行缺失的单元格补空串，使“列缺失”与“值为空”可区分
fn build_row(row_number: usize, headers: &[String], values: Vec<String>) -> Option<ImportRow> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return None;
    }

    let mut cells = HashMap::with_capacity(headers.len());
    let mut values = values.into_iter();
    for header in headers {
        let value = values.next().unwrap_or_default();
        if header.is_empty() {
            continue;
        }
        cells.entry(header.clone()).or_insert(value);
    }
    Some(ImportRow::new(row_number, cells))
}

/// 逐列按 UTF-8 解码
///
/// # 返回
/// - Err: 首个无法解码的列名（表头缺失时为列序号）
fn decode_fields(record: &ByteRecord, headers: &[String]) -> Result<Vec<String>, String> {
    record
        .iter()
        .enumerate()
        .map(|(i, field)| {
            std::str::from_utf8(field).map(str::to_string).map_err(|_| {
                headers
                    .get(i)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", i + 1))
            })
        })
        .collect()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<ImportRow>> {
        ensure_exists(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头（去除 UTF-8 BOM）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        // 按字节读取: 单行编码错误只影响该行；行号取记录起始行（空行、跨行引号字段不打乱编号）
        let mut rows = Vec::new();
        for (idx, result) in reader.byte_records().enumerate() {
            let record = result?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            match decode_fields(&record, &headers) {
                Ok(values) => {
                    if let Some(row) = build_row(row_number, &headers, values) {
                        rows.push(row);
                    }
                }
                Err(column) => {
                    warn!(row = row_number, column = %column, "CSV 行编码无效");
                    rows.push(ImportRow::unreadable(row_number, column));
                }
            }
        }

        debug!(file = %file_path.display(), rows = rows.len(), "CSV 解析完成");
        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

/// 单元格转文本
///
/// 说明:
/// - 整数值浮点（如 NIC、ID 被 Excel 存成数字）去掉 ".0"
/// - 日期单元格输出 YYYY-MM-DD（含时间时输出 ISO 日期时间）
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time() == chrono::NaiveTime::MIN => {
                ndt.date().format("%Y-%m-%d").to_string()
            }
            Some(ndt) => ndt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

impl FileParser for ExcelParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<ImportRow>> {
        ensure_exists(file_path)?;

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ImportError::NoWorksheet)??;

        // 区域可能不从 A1 开始（前导空行），行号按绝对位置计算
        let header_row_number = range.start().map(|(r, _)| r as usize + 1).unwrap_or(1);

        let mut sheet_rows = range.rows();
        let headers: Vec<String> = match sheet_rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell_to_string(cell).trim().to_string())
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut rows = Vec::new();
        for (idx, data_row) in sheet_rows.enumerate() {
            let values = data_row.iter().map(cell_to_string).collect();
            if let Some(row) = build_row(header_row_number + 1 + idx, &headers, values) {
                rows.push(row);
            }
        }

        debug!(file = %file_path.display(), rows = rows.len(), "Excel 解析完成");
        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<ImportRow>> {
        match file_extension(file_path).as_str() {
            "csv" => CsvParser.parse_rows(file_path),
            "xlsx" | "xls" => ExcelParser.parse_rows(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
