// ==========================================
// 客户档案管理系统 - 客户领域模型
// ==========================================
// 职责: 客户主记录、地址值对象、导入候选记录、亲属引用
// 红线: 亲属关系以有向边存储（A 列出 B），对称化只在读取时做
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 客户标识（由 Repository 在创建时分配）
pub type CustomerId = i64;

// ==========================================
// Address - 地址值对象
// ==========================================
// 归属: 由所属 CustomerRecord 独占
// city_id / country_id: 不透明外键，本系统不校验其存在性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city_id: Option<i64>,
    pub country_id: Option<i64>,
}

// ==========================================
// CustomerRecord - 客户主记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    // ===== 主键 =====
    pub id: Option<CustomerId>, // 持久化前为 None

    // ===== 身份信息 =====
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub nic: String, // 全局唯一

    // ===== 联系方式 =====
    pub mobile_numbers: Vec<String>, // 允许重复，保持录入顺序
    pub addresses: Vec<Address>,

    // ===== 亲属关系（有向边）=====
    pub family_member_ids: BTreeSet<CustomerId>,
}

impl CustomerRecord {
    /// 读取时对称化: 合并“我列出的人”与“列出我的人”
    ///
    /// # 参数
    /// - listed_by: 在其 family_member_ids 中列出本客户的其他客户 ID
    pub fn symmetric_family(&self, listed_by: &[CustomerId]) -> BTreeSet<CustomerId> {
        let mut all = self.family_member_ids.clone();
        all.extend(listed_by.iter().copied());
        if let Some(id) = self.id {
            all.remove(&id);
        }
        all
    }
}

// ==========================================
// FamilyRef - 表格中对另一客户的引用
// ==========================================
// 语法:
// - "42"          → Id(42)，已持久化客户的标识
// - "row:5" / "#5" → Row(5)，同一上传文件中的第 5 行
// - "nic:X123"    → Nic("X123")
// - 其他非数字文本 → Nic(原文)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FamilyRef {
    Id(CustomerId),
    Nic(String),
    Row(usize),
}

impl FamilyRef {
    /// 解析单个引用 token（已 trim，非空）
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let lower = token.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("row:") {
            if let Ok(row) = rest.trim().parse::<usize>() {
                return Some(FamilyRef::Row(row));
            }
        }
        if let Some(rest) = token.strip_prefix('#') {
            if let Ok(row) = rest.trim().parse::<usize>() {
                return Some(FamilyRef::Row(row));
            }
        }
        if lower.starts_with("nic:") {
            let nic = token[4..].trim();
            return if nic.is_empty() {
                None
            } else {
                Some(FamilyRef::Nic(nic.to_string()))
            };
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = token.parse::<CustomerId>() {
                return Some(FamilyRef::Id(id));
            }
        }

        Some(FamilyRef::Nic(token.to_string()))
    }
}

impl fmt::Display for FamilyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyRef::Id(id) => write!(f, "{}", id),
            FamilyRef::Nic(nic) => write!(f, "nic:{}", nic),
            FamilyRef::Row(row) => write!(f, "row:{}", row),
        }
    }
}

// ==========================================
// CandidateRecord - 导入/编辑候选记录
// ==========================================
// 用途: 行规范化器产出，校验器消费；单条编辑 API 也由 DTO 构造此结构
// 生命周期: 仅在一次导入或一次请求内
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub row_number: usize,              // 原始表格行号（表头为第 1 行）；单条 API 为 0
    pub existing_id: Option<CustomerId>, // 更新场景下的自身 ID
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub nic: String,
    pub mobile_numbers: Vec<String>,
    pub addresses: Vec<Address>,
    pub family_refs: Vec<FamilyRef>,
}

impl CandidateRecord {
    /// 转换为待持久化的客户记录
    ///
    /// # 参数
    /// - family_member_ids: 解析后确认存在的亲属 ID
    pub fn into_customer(self, family_member_ids: BTreeSet<CustomerId>) -> CustomerRecord {
        CustomerRecord {
            id: self.existing_id,
            name: self.name,
            date_of_birth: self.date_of_birth,
            nic: self.nic,
            mobile_numbers: self.mobile_numbers,
            addresses: self.addresses,
            family_member_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_ref_parse() {
        assert_eq!(FamilyRef::parse("42"), Some(FamilyRef::Id(42)));
        assert_eq!(FamilyRef::parse("row:3"), Some(FamilyRef::Row(3)));
        assert_eq!(FamilyRef::parse("ROW: 7"), Some(FamilyRef::Row(7)));
        assert_eq!(FamilyRef::parse("#5"), Some(FamilyRef::Row(5)));
        assert_eq!(
            FamilyRef::parse("nic:900001"),
            Some(FamilyRef::Nic("900001".to_string()))
        );
        assert_eq!(
            FamilyRef::parse("199012345V"),
            Some(FamilyRef::Nic("199012345V".to_string()))
        );
        assert_eq!(FamilyRef::parse("   "), None);
        assert_eq!(FamilyRef::parse("nic:"), None);
    }

    #[test]
    fn test_symmetric_family_excludes_self() {
        let record = CustomerRecord {
            id: Some(1),
            name: "Alice".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            nic: "A1".to_string(),
            mobile_numbers: vec![],
            addresses: vec![],
            family_member_ids: [2].into_iter().collect(),
        };

        let all = record.symmetric_family(&[3, 1, 2]);
        assert_eq!(all.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }
}
