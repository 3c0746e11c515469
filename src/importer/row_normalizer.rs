// ==========================================
// 客户档案管理系统 - 行规范化器
// ==========================================
// 阶段 1: 原始行 → 候选记录（字段映射 + 清洗 + 类型转换）
// 红线: 纯函数，仅依赖行内容与列定义
// ==========================================

use crate::domain::customer::{Address, CandidateRecord, FamilyRef};
use crate::domain::import::ImportRow;
use crate::importer::customer_importer_trait::RowNormalizer;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;

/// 多值单元格分隔符
const LIST_SEPARATORS: [char; 2] = [';', ','];

/// 接受的纯日期格式
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

// ==========================================
// ColumnSchema - 列定义
// ==========================================
// 表头精确匹配（区分大小写）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressColumns {
    pub line1: String,
    pub line2: String,
    pub city_id: String,
    pub country_id: String,
}

impl AddressColumns {
    fn with_prefix(prefix: &str) -> Self {
        Self {
            line1: format!("{}Address Line 1", prefix),
            line2: format!("{}Address Line 2", prefix),
            city_id: format!("{}City ID", prefix),
            country_id: format!("{}Country ID", prefix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    // ===== 必填列 =====
    pub name: String,
    pub date_of_birth: String,
    pub nic: String,

    // ===== 可选列 =====
    pub mobile_numbers: String,
    pub family_members: String,
    pub address_groups: Vec<AddressColumns>,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            date_of_birth: "Date of Birth".to_string(),
            nic: "NIC".to_string(),
            mobile_numbers: "Mobile Numbers".to_string(),
            family_members: "Family Members".to_string(),
            address_groups: vec![
                AddressColumns::with_prefix(""),
                AddressColumns::with_prefix("Address 2 "),
            ],
        }
    }
}

// ==========================================
// 字段解析辅助函数
// ==========================================

/// 解析出生日期
///
/// # 支持格式
/// - YYYY-MM-DD / YYYY/MM/DD / YYYYMMDD
/// - ISO 日期时间（取日期部分），如 1990-01-01T00:00:00
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    // ISO 日期时间: 前 10 位为日期，后接 'T' 或空格
    let (date_part, rest) = (value.get(..10)?, value.get(10..)?);
    if rest.starts_with('T') || rest.starts_with(' ') {
        return NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok();
    }
    None
}

/// 拆分多值单元格（`;` 或 `,`），去空白、去空项
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATORS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ==========================================
// RowNormalizerImpl
// ==========================================
pub struct RowNormalizerImpl {
    schema: ColumnSchema,
}

impl RowNormalizerImpl {
    pub fn new(schema: ColumnSchema) -> Self {
        Self { schema }
    }

    fn required_cell<'a>(&self, row: &'a ImportRow, column: &str) -> ImportResult<&'a str> {
        let value = row
            .cells
            .get(column)
            .ok_or_else(|| ImportError::MissingColumn {
                column: column.to_string(),
            })?
            .trim();
        if value.is_empty() {
            return Err(ImportError::EmptyField {
                field: column.to_string(),
            });
        }
        Ok(value)
    }

    fn optional_cell<'a>(row: &'a ImportRow, column: &str) -> Option<&'a str> {
        row.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn optional_id(row: &ImportRow, column: &str) -> ImportResult<Option<i64>> {
        match Self::optional_cell(row, column) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ImportError::IntegerFormatError {
                    field: column.to_string(),
                    value: raw.to_string(),
                }),
        }
    }

    fn addresses(&self, row: &ImportRow) -> ImportResult<Vec<Address>> {
        let mut addresses = Vec::new();
        for group in &self.schema.address_groups {
            let line1 = Self::optional_cell(row, &group.line1);
            let line2 = Self::optional_cell(row, &group.line2);
            let city_id = Self::optional_id(row, &group.city_id)?;
            let country_id = Self::optional_id(row, &group.country_id)?;

            // 任一单元格非空即视为存在该地址组
            if line1.is_none() && line2.is_none() && city_id.is_none() && country_id.is_none() {
                continue;
            }

            addresses.push(Address {
                address_line1: line1.unwrap_or_default().to_string(),
                address_line2: line2.map(str::to_string),
                city_id,
                country_id,
            });
        }
        Ok(addresses)
    }

    fn family_refs(&self, row: &ImportRow) -> Vec<FamilyRef> {
        let mut refs: Vec<FamilyRef> = Vec::new();
        if let Some(raw) = Self::optional_cell(row, &self.schema.family_members) {
            for token in split_list(raw) {
                if let Some(r) = FamilyRef::parse(&token) {
                    if !refs.contains(&r) {
                        refs.push(r);
                    }
                }
            }
        }
        refs
    }
}

impl Default for RowNormalizerImpl {
    fn default() -> Self {
        Self::new(ColumnSchema::default())
    }
}

impl RowNormalizer for RowNormalizerImpl {
    fn normalize(&self, row: &ImportRow) -> ImportResult<CandidateRecord> {
        if let Some(column) = &row.unreadable_column {
            return Err(ImportError::UnreadableRow {
                column: column.clone(),
            });
        }

        // 必填列按固定顺序检查，首个失败即返回
        let name = self.required_cell(row, &self.schema.name)?;
        let dob_raw = self.required_cell(row, &self.schema.date_of_birth)?;
        let nic = self.required_cell(row, &self.schema.nic)?;

        let date_of_birth = parse_date(dob_raw).ok_or_else(|| ImportError::DateFormatError {
            field: self.schema.date_of_birth.clone(),
            value: dob_raw.to_string(),
        })?;

        let mobile_numbers = Self::optional_cell(row, &self.schema.mobile_numbers)
            .map(split_list)
            .unwrap_or_default();

        Ok(CandidateRecord {
            row_number: row.row_number,
            existing_id: None,
            name: name.to_string(),
            date_of_birth,
            nic: nic.to_string(),
            mobile_numbers,
            addresses: self.addresses(row)?,
            family_refs: self.family_refs(row),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(cells: &[(&str, &str)]) -> ImportRow {
        ImportRow::new(
            2,
            cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_normalize_full_row() {
        let normalizer = RowNormalizerImpl::default();
        let candidate = normalizer
            .normalize(&row(&[
                ("Name", "  Alice  "),
                ("Date of Birth", "1990/01/15"),
                ("NIC", "A1"),
                ("Mobile Numbers", "0771; 0772 ,"),
                ("Address Line 1", "12 Main St"),
                ("City ID", "3"),
                ("Address 2 Address Line 1", "PO Box 9"),
                ("Family Members", "42; row:3, nic:B1; B2; 42"),
            ]))
            .unwrap();

        assert_eq!(candidate.name, "Alice");
        assert_eq!(
            candidate.date_of_birth,
            NaiveDate::from_ymd_opt(1990, 1, 15).unwrap()
        );
        assert_eq!(candidate.mobile_numbers, vec!["0771", "0772"]);
        assert_eq!(candidate.addresses.len(), 2);
        assert_eq!(candidate.addresses[0].city_id, Some(3));
        assert_eq!(
            candidate.family_refs,
            vec![
                FamilyRef::Id(42),
                FamilyRef::Row(3),
                FamilyRef::Nic("B1".to_string()),
                FamilyRef::Nic("B2".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_optional_columns_default_empty() {
        let candidate = RowNormalizerImpl::default()
            .normalize(&row(&[
                ("Name", "Bob"),
                ("Date of Birth", "19850630"),
                ("NIC", "B1"),
            ]))
            .unwrap();

        assert!(candidate.mobile_numbers.is_empty());
        assert!(candidate.addresses.is_empty());
        assert!(candidate.family_refs.is_empty());
    }

    #[test]
    fn test_missing_required_column_and_empty_cell() {
        let normalizer = RowNormalizerImpl::default();

        let err = normalizer
            .normalize(&row(&[("Name", "Bob"), ("Date of Birth", "1985-06-30")]))
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn { column } if column == "NIC"));

        let err = normalizer
            .normalize(&row(&[
                ("Name", "   "),
                ("Date of Birth", "1985-06-30"),
                ("NIC", "B1"),
            ]))
            .unwrap_err();
        assert!(matches!(err, ImportError::EmptyField { field } if field == "Name"));
    }

    #[test]
    fn test_bad_date_and_bad_city_id() {
        let normalizer = RowNormalizerImpl::default();

        let err = normalizer
            .normalize(&row(&[
                ("Name", "Bob"),
                ("Date of Birth", "30/06/1985"),
                ("NIC", "B1"),
            ]))
            .unwrap_err();
        assert!(matches!(err, ImportError::DateFormatError { .. }));

        let err = normalizer
            .normalize(&row(&[
                ("Name", "Bob"),
                ("Date of Birth", "1985-06-30"),
                ("NIC", "B1"),
                ("Address Line 1", "1 Road"),
                ("City ID", "Colombo"),
            ]))
            .unwrap_err();
        assert!(matches!(err, ImportError::IntegerFormatError { value, .. } if value == "Colombo"));
    }

    #[test]
    fn test_unreadable_row_fails_before_column_checks() {
        let err = RowNormalizerImpl::default()
            .normalize(&ImportRow::unreadable(7, "Name"))
            .unwrap_err();
        assert!(matches!(err, ImportError::UnreadableRow { column } if column == "Name"));
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        assert_eq!(parse_date("2001-02-03"), Some(expected));
        assert_eq!(parse_date("2001/02/03"), Some(expected));
        assert_eq!(parse_date("20010203"), Some(expected));
        assert_eq!(parse_date("2001-02-03T10:20:30"), Some(expected));
        assert_eq!(parse_date("2001-02-03 00:00:00"), Some(expected));
        assert_eq!(parse_date("2001-02-30"), None);
        assert_eq!(parse_date("yesterday"), None);
    }
}
