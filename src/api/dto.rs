// ==========================================
// 客户档案管理系统 - API 数据传输对象
// ==========================================
// 职责: 对外 JSON 结构（camelCase），与领域模型互转
// ==========================================

use crate::domain::customer::{Address, CandidateRecord, CustomerId, CustomerRecord, FamilyRef};
use crate::domain::import::{ImportReport, RowReport};
use crate::domain::types::ImportStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// AddressDto
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    #[serde(default)]
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<i64>,
}

impl From<AddressDto> for Address {
    fn from(dto: AddressDto) -> Self {
        Address {
            address_line1: dto.address_line1,
            address_line2: dto.address_line2,
            city_id: dto.city_id,
            country_id: dto.country_id,
        }
    }
}

impl From<Address> for AddressDto {
    fn from(address: Address) -> Self {
        AddressDto {
            address_line1: address.address_line1,
            address_line2: address.address_line2,
            city_id: address.city_id,
            country_id: address.country_id,
        }
    }
}

// ==========================================
// CustomerDto - 单条客户请求/响应体
// ==========================================
// dateOfBirth: ISO 日期字符串（YYYY-MM-DD）
// familyMemberIds: 响应中为对称化后的亲属集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CustomerId>,
    #[serde(default)]
    pub name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub nic: String,
    #[serde(default)]
    pub mobile_numbers: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<AddressDto>,
    #[serde(default)]
    pub family_member_ids: Vec<CustomerId>,
}

impl CustomerDto {
    /// 转换为候选记录（单条 API 行号为 0）
    pub fn into_candidate(self, existing_id: Option<CustomerId>) -> CandidateRecord {
        let mut family_refs = Vec::new();
        for id in self.family_member_ids {
            let reference = FamilyRef::Id(id);
            if !family_refs.contains(&reference) {
                family_refs.push(reference);
            }
        }

        CandidateRecord {
            row_number: 0,
            existing_id,
            name: self.name,
            date_of_birth: self.date_of_birth,
            nic: self.nic,
            mobile_numbers: self.mobile_numbers,
            addresses: self.addresses.into_iter().map(Address::from).collect(),
            family_refs,
        }
    }

    /// 由持久化记录构造响应（亲属集合已对称化）
    pub fn from_record(record: CustomerRecord, family: BTreeSet<CustomerId>) -> Self {
        CustomerDto {
            id: record.id,
            name: record.name,
            date_of_birth: record.date_of_birth,
            nic: record.nic,
            mobile_numbers: record.mobile_numbers,
            addresses: record.addresses.into_iter().map(AddressDto::from).collect(),
            family_member_ids: family.into_iter().collect(),
        }
    }
}

// ==========================================
// BulkUploadResponse - 批量上传响应
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadResponse {
    pub batch_id: String,
    pub status: ImportStatus,
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub rows: Vec<RowReport>,
    pub elapsed_ms: u64,
}

impl From<ImportReport> for BulkUploadResponse {
    fn from(report: ImportReport) -> Self {
        BulkUploadResponse {
            batch_id: report.batch_id,
            status: report.status,
            total_records: report.total_records,
            success_count: report.success_count,
            failure_count: report.failure_count,
            message: report.message,
            rows: report.rows,
            elapsed_ms: report.elapsed_ms,
        }
    }
}
