// ==========================================
// 客户档案管理系统 - 记录校验器
// ==========================================
// 阶段 2: 字段级与记录级规则校验
// 规则（按优先级）:
// 1. 姓名非空
// 2. 出生日期不晚于本次运行的当前日期
// 3. NIC 非空，且不与本批次已接受的 NIC、已持久化 NIC 重复（区分大小写）
// 4. 每个地址的地址行1非空
// 5. 亲属引用不得指向自身
// 红线: 先 trim 再校验；只有通过校验的行才占用 NIC
// ==========================================

use crate::domain::customer::{Address, CandidateRecord, FamilyRef};
use crate::domain::import::ValidationIssue;
use crate::domain::types::{ValidationMode, ValidationRule};
use crate::i18n::{t, t_with_args};
use crate::importer::customer_importer_trait::RecordValidator;
use chrono::NaiveDate;
use std::collections::HashSet;

// ==========================================
// BatchNicSet - 批内 NIC 累加器
// ==========================================
// 在校验折叠中按文件顺序传递
#[derive(Debug, Clone, Default)]
pub struct BatchNicSet {
    accepted: HashSet<String>,
}

impl BatchNicSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, nic: &str) -> bool {
        self.accepted.contains(nic)
    }

    /// 登记已接受的 NIC，返回是否为首次出现
    pub fn claim(&mut self, nic: &str) -> bool {
        self.accepted.insert(nic.to_string())
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

// ==========================================
// ValidationContext - 校验上下文
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub today: NaiveDate,
    pub mode: ValidationMode,
    pub seen_nics: &'a BatchNicSet,
    pub persisted_nics: &'a HashSet<String>,
}

// ==========================================
// RecordValidatorImpl
// ==========================================
#[derive(Debug, Default)]
pub struct RecordValidatorImpl;

impl RecordValidatorImpl {
    pub fn new() -> Self {
        Self
    }

    /// trim 全部文本字段，丢弃空白手机号
    fn trimmed(candidate: CandidateRecord) -> CandidateRecord {
        CandidateRecord {
            name: candidate.name.trim().to_string(),
            nic: candidate.nic.trim().to_string(),
            mobile_numbers: candidate
                .mobile_numbers
                .iter()
                .map(|m| m.trim())
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            addresses: candidate
                .addresses
                .into_iter()
                .map(|a| Address {
                    address_line1: a.address_line1.trim().to_string(),
                    address_line2: a
                        .address_line2
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty()),
                    city_id: a.city_id,
                    country_id: a.country_id,
                })
                .collect(),
            family_refs: candidate
                .family_refs
                .into_iter()
                .map(|r| match r {
                    FamilyRef::Nic(nic) => FamilyRef::Nic(nic.trim().to_string()),
                    other => other,
                })
                .collect(),
            ..candidate
        }
    }

    fn is_self_reference(candidate: &CandidateRecord, reference: &FamilyRef) -> bool {
        match reference {
            FamilyRef::Nic(nic) => *nic == candidate.nic,
            FamilyRef::Row(row) => candidate.row_number > 0 && *row == candidate.row_number,
            FamilyRef::Id(id) => candidate.existing_id == Some(*id),
        }
    }
}

impl RecordValidator for RecordValidatorImpl {
    fn validate(
        &self,
        candidate: CandidateRecord,
        ctx: &ValidationContext<'_>,
    ) -> Result<CandidateRecord, Vec<ValidationIssue>> {
        let record = Self::trimmed(candidate);
        let fail_fast = ctx.mode == ValidationMode::FailFast;
        let mut issues: Vec<ValidationIssue> = Vec::new();

        // 记录一条问题；FailFast 模式下返回 true 表示立即结束
        let mut report = |issue: ValidationIssue| -> bool {
            issues.push(issue);
            fail_fast
        };

        // ===== 规则 1: 姓名 =====
        if record.name.is_empty()
            && report(ValidationIssue::new(
                "name",
                ValidationRule::NameRequired,
                t("validation.name_required"),
            ))
        {
            return Err(issues);
        }

        // ===== 规则 2: 出生日期 =====
        if record.date_of_birth > ctx.today
            && report(ValidationIssue::new(
                "dateOfBirth",
                ValidationRule::DateOfBirthInFuture,
                t("validation.dob_in_future"),
            ))
        {
            return Err(issues);
        }

        // ===== 规则 3: NIC =====
        let nic_issue = if record.nic.is_empty() {
            Some(ValidationIssue::new(
                "nic",
                ValidationRule::NicRequired,
                t("validation.nic_required"),
            ))
        } else if ctx.seen_nics.contains(&record.nic) {
            Some(ValidationIssue::new(
                "nic",
                ValidationRule::DuplicateNicInBatch,
                t_with_args("validation.duplicate_nic", &[("nic", &record.nic)]),
            ))
        } else if ctx.persisted_nics.contains(&record.nic) {
            Some(ValidationIssue::new(
                "nic",
                ValidationRule::DuplicateNicPersisted,
                t_with_args("validation.duplicate_nic", &[("nic", &record.nic)]),
            ))
        } else {
            None
        };
        if let Some(issue) = nic_issue {
            if report(issue) {
                return Err(issues);
            }
        }

        // ===== 规则 4: 地址 =====
        for (idx, address) in record.addresses.iter().enumerate() {
            if address.address_line1.is_empty() {
                let index = (idx + 1).to_string();
                if report(ValidationIssue::new(
                    &format!("addresses[{}].addressLine1", idx),
                    ValidationRule::AddressLine1Required,
                    t_with_args("validation.address_line1_required", &[("index", &index)]),
                )) {
                    return Err(issues);
                }
            }
        }

        // ===== 规则 5: 自引用 =====
        for reference in &record.family_refs {
            if Self::is_self_reference(&record, reference) {
                let shown = reference.to_string();
                if report(ValidationIssue::new(
                    "familyMembers",
                    ValidationRule::SelfReference,
                    t_with_args("validation.self_reference", &[("reference", &shown)]),
                )) {
                    return Err(issues);
                }
            }
        }

        if issues.is_empty() {
            Ok(record)
        } else {
            Err(issues)
        }
    }
}

/// 按文件顺序校验整批候选记录，NIC 累加器在折叠中传递
///
/// # 返回
/// - 与输入一一对应的校验结果
/// - 最终的批内 NIC 集合（仅包含通过校验的行）
pub fn validate_batch(
    validator: &dyn RecordValidator,
    candidates: Vec<CandidateRecord>,
    today: NaiveDate,
    mode: ValidationMode,
    persisted_nics: &HashSet<String>,
) -> (Vec<Result<CandidateRecord, Vec<ValidationIssue>>>, BatchNicSet) {
    candidates.into_iter().fold(
        (Vec::new(), BatchNicSet::new()),
        |(mut results, mut seen), candidate| {
            let ctx = ValidationContext {
                today,
                mode,
                seen_nics: &seen,
                persisted_nics,
            };
            let result = validator.validate(candidate, &ctx);
            if let Ok(record) = &result {
                seen.claim(&record.nic);
            }
            results.push(result);
            (results, seen)
        },
    )
}
