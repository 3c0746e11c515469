// ==========================================
// 客户档案管理系统 - 亲属关系解析器
// ==========================================
// 阶段 3: 亲属引用 → ResolvedExisting / ResolvedInBatch / Dangling
// 规则:
// - Id(n):  已持久化 → ResolvedExisting(n)，否则 Dangling
// - Nic(x): 批内已校验记录优先 → ResolvedInBatch(row)；
//           其次已持久化 → ResolvedExisting(id)；否则 Dangling
// - Row(r): 批内已校验记录 → ResolvedInBatch(r)，否则 Dangling
// 红线: 环与互相引用合法；不做对称化；Dangling 只产生警告
// ==========================================

use crate::domain::customer::{CandidateRecord, CustomerId, FamilyRef};
use crate::domain::import::{ReferenceStatus, ResolvedCandidate, ResolvedReference};
use crate::importer::customer_importer_trait::FamilyResolver;
use std::collections::{BTreeSet, HashMap, HashSet};

// ==========================================
// PersistedLookup - 已持久化客户的存在性快照
// ==========================================
// 由协调器经存储守卫并发查询后构建
#[derive(Debug, Clone, Default)]
pub struct PersistedLookup {
    pub existing_ids: HashSet<CustomerId>,
    pub nic_ids: HashMap<String, CustomerId>,
    /// 查询超时（重试后仍失败）而无法确认的引用
    pub unverified: HashSet<FamilyRef>,
}

impl PersistedLookup {
    pub fn is_unverified(&self, reference: &FamilyRef) -> bool {
        self.unverified.contains(reference)
    }
}

/// 需要向 Repository 查询的引用目标
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTargets {
    pub ids: BTreeSet<CustomerId>,
    pub nics: BTreeSet<String>,
}

/// 收集一批记录中需要查询存储的引用（批内可解析的 NIC 不查询）
pub fn lookup_targets(batch: &[CandidateRecord]) -> LookupTargets {
    let batch_nics: HashSet<&str> = batch.iter().map(|c| c.nic.as_str()).collect();
    let mut targets = LookupTargets::default();

    for reference in batch.iter().flat_map(|c| c.family_refs.iter()) {
        match reference {
            FamilyRef::Id(id) => {
                targets.ids.insert(*id);
            }
            FamilyRef::Nic(nic) if !batch_nics.contains(nic.as_str()) => {
                targets.nics.insert(nic.clone());
            }
            FamilyRef::Nic(_) | FamilyRef::Row(_) => {}
        }
    }
    targets
}

// ==========================================
// FamilyResolverImpl
// ==========================================
#[derive(Debug, Default)]
pub struct FamilyResolverImpl;

impl FamilyResolverImpl {
    pub fn new() -> Self {
        Self
    }
}

impl FamilyResolver for FamilyResolverImpl {
    fn resolve(
        &self,
        batch: Vec<CandidateRecord>,
        persisted: &PersistedLookup,
    ) -> Vec<ResolvedCandidate> {
        let nic_rows: HashMap<String, usize> = batch
            .iter()
            .map(|c| (c.nic.clone(), c.row_number))
            .collect();
        let batch_rows: HashSet<usize> = batch.iter().map(|c| c.row_number).collect();

        batch
            .into_iter()
            .map(|candidate| {
                let references = candidate
                    .family_refs
                    .iter()
                    .map(|reference| {
                        let status = match reference {
                            FamilyRef::Id(id) if persisted.existing_ids.contains(id) => {
                                ReferenceStatus::ResolvedExisting(*id)
                            }
                            FamilyRef::Nic(nic) => match nic_rows.get(nic) {
                                Some(row) => ReferenceStatus::ResolvedInBatch(*row),
                                None => persisted
                                    .nic_ids
                                    .get(nic)
                                    .map(|id| ReferenceStatus::ResolvedExisting(*id))
                                    .unwrap_or(ReferenceStatus::Dangling),
                            },
                            FamilyRef::Row(row) if batch_rows.contains(row) => {
                                ReferenceStatus::ResolvedInBatch(*row)
                            }
                            _ => ReferenceStatus::Dangling,
                        };
                        ResolvedReference {
                            reference: reference.clone(),
                            status,
                        }
                    })
                    .collect();

                ResolvedCandidate {
                    candidate,
                    references,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate(row_number: usize, nic: &str, refs: Vec<FamilyRef>) -> CandidateRecord {
        CandidateRecord {
            row_number,
            existing_id: None,
            name: format!("Person {}", nic),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 3, 3).unwrap(),
            nic: nic.to_string(),
            mobile_numbers: vec![],
            addresses: vec![],
            family_refs: refs,
        }
    }

    fn statuses(resolved: &ResolvedCandidate) -> Vec<ReferenceStatus> {
        resolved.references.iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_resolve_all_reference_kinds() {
        let persisted = PersistedLookup {
            existing_ids: [10].into_iter().collect(),
            nic_ids: [("P1".to_string(), 10)].into_iter().collect(),
            unverified: HashSet::new(),
        };

        let batch = vec![
            candidate(
                2,
                "A1",
                vec![
                    FamilyRef::Id(10),
                    FamilyRef::Id(99),
                    FamilyRef::Nic("B1".to_string()),
                    FamilyRef::Nic("P1".to_string()),
                    FamilyRef::Nic("ZZ".to_string()),
                    FamilyRef::Row(3),
                    FamilyRef::Row(7),
                ],
            ),
            candidate(3, "B1", vec![FamilyRef::Row(2)]),
        ];

        let resolved = FamilyResolverImpl::new().resolve(batch, &persisted);

        assert_eq!(
            statuses(&resolved[0]),
            vec![
                ReferenceStatus::ResolvedExisting(10),
                ReferenceStatus::Dangling,
                ReferenceStatus::ResolvedInBatch(3),
                ReferenceStatus::ResolvedExisting(10),
                ReferenceStatus::Dangling,
                ReferenceStatus::ResolvedInBatch(3),
                ReferenceStatus::Dangling,
            ]
        );
        assert_eq!(statuses(&resolved[1]), vec![ReferenceStatus::ResolvedInBatch(2)]);
        assert_eq!(resolved[0].dangling().count(), 3);
    }

    #[test]
    fn test_batch_nic_shadows_persisted_nic() {
        let persisted = PersistedLookup {
            existing_ids: HashSet::new(),
            nic_ids: [("B1".to_string(), 5)].into_iter().collect(),
            unverified: HashSet::new(),
        };
        let batch = vec![
            candidate(2, "A1", vec![FamilyRef::Nic("B1".to_string())]),
            candidate(4, "B1", vec![]),
        ];

        let resolved = FamilyResolverImpl::new().resolve(batch, &persisted);
        assert_eq!(statuses(&resolved[0]), vec![ReferenceStatus::ResolvedInBatch(4)]);
    }

    #[test]
    fn test_lookup_targets_skip_batch_nics_and_rows() {
        let batch = vec![
            candidate(
                2,
                "A1",
                vec![
                    FamilyRef::Id(1),
                    FamilyRef::Nic("B1".to_string()),
                    FamilyRef::Nic("X9".to_string()),
                    FamilyRef::Row(3),
                ],
            ),
            candidate(3, "B1", vec![FamilyRef::Id(1)]),
        ];

        let targets = lookup_targets(&batch);
        assert_eq!(targets.ids.into_iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(targets.nics.into_iter().collect::<Vec<_>>(), vec!["X9".to_string()]);
    }
}
