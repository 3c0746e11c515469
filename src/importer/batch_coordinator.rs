// ==========================================
// 客户档案管理系统 - 批量导入协调器
// ==========================================
// 职责: 整合导入流程，从文件到数据库，产出汇总报告
// 流程: 预检 → 规范化 → NIC 查询 + 校验折叠 → 亲属解析 → 逐行落库 → 报告
// 红线:
// - 每行恰好一个结果；successCount + failureCount == totalRecords
// - 行失败互不影响；系统性失败中止剩余行（已提交行保持成功）
// - 落库按文件顺序串行，每行一个事务；唯一约束由存储层最终裁决
// ==========================================

use crate::config::ImportConfig;
use crate::domain::customer::{CandidateRecord, CustomerId, FamilyRef};
use crate::domain::import::{
    ImportReport, ImportRow, ImportWarning, ReferenceStatus, ResolvedCandidate, RowOutcome,
    RowReport, ValidationIssue,
};
use crate::domain::types::{ImportStatus, ValidationRule, WarningKind};
use crate::i18n::{t, t_with_args};
use crate::importer::cancellation::ImportCancellation;
use crate::importer::customer_importer_trait::{
    CustomerImporter, FamilyResolver, FileParser, RecordValidator, RowNormalizer,
};
use crate::importer::error::ImportError;
use crate::importer::family_resolver::{lookup_targets, FamilyResolverImpl, PersistedLookup};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::record_validator::{validate_batch, RecordValidatorImpl};
use crate::importer::row_normalizer::RowNormalizerImpl;
use crate::importer::store_guard::{StoreFailure, StoreGuard};
use crate::repository::{CustomerRepository, RepositoryError};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 报告 message 中列出的失败行上限
const MAX_ERRORS_IN_MESSAGE: usize = 10;

// ==========================================
// 运行期状态
// ==========================================

/// 单行的处理槽位（按文件顺序）
struct RowSlot {
    row_number: usize,
    nic: Option<String>,
    outcome: Option<RowOutcome>,
}

/// 中止原因
enum Halt {
    Rejected(String),
    Cancelled,
}

/// 一次导入运行的可变状态
struct ImportRun {
    batch_id: String,
    started: Instant,
    slots: Vec<RowSlot>,
}

impl ImportRun {
    fn new(rows: &[ImportRow]) -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            slots: rows
                .iter()
                .map(|r| RowSlot {
                    row_number: r.row_number,
                    nic: None,
                    outcome: None,
                })
                .collect(),
        }
    }

    fn set(&mut self, idx: usize, outcome: RowOutcome) {
        self.slots[idx].outcome = Some(outcome);
    }

    fn parse_failed(&mut self, idx: usize, reason: String) {
        self.set(idx, RowOutcome::ParseFailed { reason });
    }

    /// 给已成功的行追加警告
    fn warn_row(&mut self, idx: usize, warning: ImportWarning) {
        if let Some(RowOutcome::Succeeded { warnings, .. }) = &mut self.slots[idx].outcome {
            warnings.push(warning);
        }
    }

    /// 尚无结果的行全部标记为 Skipped
    fn skip_remaining(&mut self, reason: &str) {
        for slot in self.slots.iter_mut().filter(|s| s.outcome.is_none()) {
            slot.outcome = Some(RowOutcome::Skipped {
                reason: reason.to_string(),
            });
        }
    }

    /// 汇总报告
    fn finish(mut self, halt: Option<Halt>) -> ImportReport {
        let (status_hint, message_hint) = match halt {
            Some(Halt::Rejected(reason)) => {
                let committed = self
                    .slots
                    .iter()
                    .filter(|s| matches!(s.outcome, Some(RowOutcome::Succeeded { .. })))
                    .count();
                let skipped = t_with_args("import.row_skipped_rejected", &[("reason", &reason)]);
                self.skip_remaining(&skipped);
                let message = if committed == 0 {
                    t_with_args("import.summary_rejected", &[("reason", &reason)])
                } else {
                    // 中止前已提交的行不回滚
                    t_with_args(
                        "import.summary_rejected_partial",
                        &[("reason", &reason), ("committed", &committed.to_string())],
                    )
                };
                (Some(ImportStatus::Rejected), Some(message))
            }
            Some(Halt::Cancelled) => {
                let done = self.slots.iter().filter(|s| s.outcome.is_some()).count();
                let total = self.slots.len();
                self.skip_remaining(&t("import.row_skipped_cancelled"));
                (
                    Some(ImportStatus::Cancelled),
                    Some(t_with_args(
                        "import.summary_cancelled",
                        &[("done", &done.to_string()), ("total", &total.to_string())],
                    )),
                )
            }
            None => (None, None),
        };

        let rows: Vec<RowReport> = self
            .slots
            .into_iter()
            .map(|slot| RowReport {
                row_number: slot.row_number,
                nic: slot.nic,
                outcome: slot.outcome.unwrap_or_else(|| RowOutcome::Skipped {
                    reason: t("common.failed"),
                }),
            })
            .collect();

        let mut report = ImportReport::from_rows(
            self.batch_id,
            status_hint.unwrap_or(ImportStatus::Completed),
            rows,
            message_hint,
            self.started.elapsed().as_millis() as u64,
        );

        if status_hint.is_none() {
            if report.total_records == 0 {
                report.message = Some(t("import.empty_file"));
            } else if report.failure_count == 0 {
                report.message = Some(t_with_args(
                    "import.summary_all_succeeded",
                    &[("total", &report.total_records.to_string())],
                ));
            } else {
                report.status = ImportStatus::CompletedWithFailures;
                let errors = report.failure_summaries(MAX_ERRORS_IN_MESSAGE).join("; ");
                report.message = Some(t_with_args(
                    "import.summary_partial",
                    &[
                        ("failed", &report.failure_count.to_string()),
                        ("total", &report.total_records.to_string()),
                        ("errors", &errors),
                    ],
                ));
            }
        }

        info!(
            batch_id = %report.batch_id,
            status = %report.status,
            total = report.total_records,
            success = report.success_count,
            failed = report.failure_count,
            elapsed_ms = report.elapsed_ms,
            "导入完成"
        );
        report
    }
}

/// 存储拒绝写入 → 行级校验失败（唯一约束即 NIC 重复）
fn rejection_outcome(err: &RepositoryError, nic: &str) -> RowOutcome {
    let issue = match err {
        RepositoryError::DuplicateKey(_) => ValidationIssue::new(
            "nic",
            ValidationRule::DuplicateNicPersisted,
            t_with_args("validation.duplicate_nic", &[("nic", nic)]),
        ),
        other => ValidationIssue::new(
            "record",
            ValidationRule::StoreConstraint,
            t_with_args("import.store_rejected", &[("reason", &other.to_string())]),
        ),
    };
    RowOutcome::ValidationFailed {
        errors: vec![issue],
    }
}

fn warning(kind: WarningKind, reference: &FamilyRef) -> ImportWarning {
    let shown = reference.to_string();
    let key = match kind {
        WarningKind::DanglingReference => "import.reference_dangling",
        WarningKind::InBatchTargetFailed => "import.reference_target_failed",
        WarningKind::SelfReferenceDropped => "import.reference_self_dropped",
    };
    ImportWarning {
        kind,
        reference: shown.clone(),
        message: t_with_args(key, &[("reference", &shown)]),
    }
}

// ==========================================
// BatchCoordinator - 批量导入协调器
// ==========================================
pub struct BatchCoordinator {
    // 数据访问层
    repo: Arc<dyn CustomerRepository>,

    // 运行参数
    config: ImportConfig,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    normalizer: Box<dyn RowNormalizer>,
    validator: Box<dyn RecordValidator>,
    resolver: Box<dyn FamilyResolver>,
}

impl BatchCoordinator {
    /// 创建新的 BatchCoordinator 实例
    ///
    /// # 参数
    /// - repo: 客户仓储
    /// - config: 导入配置快照
    /// - file_parser: 文件解析器
    /// - normalizer: 行规范化器
    /// - validator: 记录校验器
    /// - resolver: 亲属关系解析器
    pub fn new(
        repo: Arc<dyn CustomerRepository>,
        config: ImportConfig,
        file_parser: Box<dyn FileParser>,
        normalizer: Box<dyn RowNormalizer>,
        validator: Box<dyn RecordValidator>,
        resolver: Box<dyn FamilyResolver>,
    ) -> Self {
        Self {
            repo,
            config,
            file_parser,
            normalizer,
            validator,
            resolver,
        }
    }

    /// 使用默认组件创建（通用文件解析器 + 默认列定义）
    pub fn with_defaults(repo: Arc<dyn CustomerRepository>, config: ImportConfig) -> Self {
        Self::new(
            repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(RowNormalizerImpl::default()),
            Box::new(RecordValidatorImpl::new()),
            Box::new(FamilyResolverImpl::new()),
        )
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    fn guard(&self) -> StoreGuard {
        StoreGuard::new(
            Arc::clone(&self.repo),
            self.config.store_timeout(),
            self.config.store_retries,
        )
    }

    fn lookup_width(&self) -> usize {
        self.config.lookup_concurrency.max(1)
    }

    /// 文件级失败 → 拒绝报告（totalRecords = 0）
    fn file_rejected(&self, file_path: &Path, err: &ImportError) -> ImportReport {
        let reason = err.localized();
        error!(file = %file_path.display(), error = %err, "文件无法解析，整批拒绝");

        let run = ImportRun::new(&[]);
        run.finish(Some(Halt::Rejected(reason)))
    }

    // ===== 阶段 2: NIC 存在性查询（并发）=====

    /// # 返回
    /// - Ok((已持久化 NIC 集合, 查询失败的 NIC → 原因))
    /// - Err: 系统性失败原因
    async fn lookup_persisted_nics(
        &self,
        guard: &StoreGuard,
        candidates: &[(usize, CandidateRecord)],
    ) -> Result<(HashSet<String>, HashMap<String, String>), String> {
        let nics: BTreeSet<String> = candidates.iter().map(|(_, c)| c.nic.clone()).collect();

        let results: Vec<(String, Result<bool, StoreFailure>)> = stream::iter(nics)
            .map(|nic| async move {
                let result = guard
                    .call("exists_by_nic", || guard.repository().exists_by_nic(&nic))
                    .await;
                (nic, result)
            })
            .buffered(self.lookup_width())
            .collect()
            .await;

        let mut persisted = HashSet::new();
        let mut failed = HashMap::new();
        for (nic, result) in results {
            match result {
                Ok(true) => {
                    persisted.insert(nic);
                }
                Ok(false) => {}
                Err(StoreFailure::Systemic(reason)) => return Err(reason),
                Err(other) => {
                    failed.insert(nic, other.to_string());
                }
            }
        }
        Ok((persisted, failed))
    }

    // ===== 阶段 3: 亲属引用存在性查询（并发）=====

    async fn lookup_references(
        &self,
        guard: &StoreGuard,
        batch: &[CandidateRecord],
    ) -> Result<PersistedLookup, String> {
        let targets = lookup_targets(batch);
        let width = self.lookup_width();

        let id_results: Vec<(CustomerId, Result<bool, StoreFailure>)> =
            stream::iter(targets.ids)
                .map(|id| async move {
                    (id, guard.call("exists", || guard.repository().exists(id)).await)
                })
                .buffered(width)
                .collect()
                .await;

        let nic_results: Vec<(String, Result<Option<CustomerId>, StoreFailure>)> =
            stream::iter(targets.nics)
                .map(|nic| async move {
                    let result = guard
                        .call("find_id_by_nic", || guard.repository().find_id_by_nic(&nic))
                        .await;
                    (nic, result)
                })
                .buffered(width)
                .collect()
                .await;

        let mut lookup = PersistedLookup::default();
        for (id, result) in id_results {
            match result {
                Ok(true) => {
                    lookup.existing_ids.insert(id);
                }
                Ok(false) => {}
                Err(StoreFailure::Systemic(reason)) => return Err(reason),
                Err(_) => {
                    lookup.unverified.insert(FamilyRef::Id(id));
                }
            }
        }
        for (nic, result) in nic_results {
            match result {
                Ok(Some(id)) => {
                    lookup.nic_ids.insert(nic, id);
                }
                Ok(None) => {}
                Err(StoreFailure::Systemic(reason)) => return Err(reason),
                Err(_) => {
                    lookup.unverified.insert(FamilyRef::Nic(nic));
                }
            }
        }
        Ok(lookup)
    }

    // ===== 阶段 4: 逐行落库 =====

    async fn persist(
        &self,
        guard: &StoreGuard,
        run: &mut ImportRun,
        resolved: Vec<(usize, ResolvedCandidate)>,
        cancel: &ImportCancellation,
    ) -> Option<Halt> {
        // 行号 → 槽位（文件顺序），先后以槽位判断，不依赖行号递增
        let position: HashMap<usize, usize> = run
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.row_number, i))
            .collect();
        // 已提交行: 行号 → 客户 ID
        let mut committed: HashMap<usize, CustomerId> = HashMap::new();
        // 延迟边: 目标行号 → [(来源槽位, 来源客户 ID)]
        let mut deferred: HashMap<usize, Vec<(usize, CustomerId)>> = HashMap::new();
        let mut halt = None;

        for (idx, item) in resolved {
            if cancel.is_cancelled() {
                warn!(row = item.candidate.row_number, "导入已取消，停止落库");
                halt = Some(Halt::Cancelled);
                break;
            }

            let row_number = item.candidate.row_number;
            let mut warnings = Vec::new();
            let mut outgoing: BTreeSet<CustomerId> = item.existing_targets().collect();
            let mut later_targets = Vec::new();

            for reference in &item.references {
                if let ReferenceStatus::ResolvedInBatch(target) = reference.status {
                    let target_idx = position.get(&target).copied().unwrap_or(idx);
                    if target_idx < idx {
                        match committed.get(&target) {
                            Some(id) => {
                                outgoing.insert(*id);
                            }
                            None => warnings.push(warning(
                                WarningKind::InBatchTargetFailed,
                                &reference.reference,
                            )),
                        }
                    } else if target_idx > idx {
                        later_targets.push(target);
                    }
                }
            }

            let incoming = deferred.remove(&row_number).unwrap_or_default();
            let incoming_ids: Vec<CustomerId> = incoming.iter().map(|(_, id)| *id).collect();
            let nic = item.candidate.nic.clone();
            let record = item.candidate.clone().into_customer(outgoing);

            let result = guard.create_reconciled(&record, &incoming_ids).await;

            match result {
                Ok(customer_id) => {
                    for dangling in item.dangling() {
                        let kind = match dangling {
                            FamilyRef::Id(id) if *id == customer_id => {
                                WarningKind::SelfReferenceDropped
                            }
                            _ => WarningKind::DanglingReference,
                        };
                        warnings.push(warning(kind, dangling));
                    }
                    debug!(row = row_number, customer_id = customer_id, "行已落库");

                    committed.insert(row_number, customer_id);
                    for target in later_targets {
                        deferred.entry(target).or_default().push((idx, customer_id));
                    }
                    run.set(
                        idx,
                        RowOutcome::Succeeded {
                            customer_id,
                            warnings,
                        },
                    );
                }
                Err(failure) => {
                    let target_ref = FamilyRef::Row(row_number);
                    for (source_idx, _) in &incoming {
                        run.warn_row(
                            *source_idx,
                            warning(WarningKind::InBatchTargetFailed, &target_ref),
                        );
                    }

                    match failure {
                        StoreFailure::Systemic(reason) => {
                            error!(row = row_number, reason = %reason, "存储不可达，中止导入");
                            halt = Some(Halt::Rejected(reason));
                            break;
                        }
                        StoreFailure::RowTimeout(reason) => {
                            warn!(row = row_number, reason = %reason, "落库超时");
                            run.parse_failed(idx, reason);
                        }
                        StoreFailure::Rejected(err) => {
                            warn!(row = row_number, error = %err, "存储拒绝写入");
                            run.set(idx, rejection_outcome(&err, &nic));
                        }
                    }
                }
            }
        }

        // 目标行未能落库的延迟边: 给来源行补警告
        for (target, sources) in deferred {
            let target_ref = FamilyRef::Row(target);
            for (source_idx, _) in sources {
                run.warn_row(
                    source_idx,
                    warning(WarningKind::InBatchTargetFailed, &target_ref),
                );
            }
        }

        halt
    }

    /// 导入主流程
    async fn run(&self, rows: Vec<ImportRow>, cancel: &ImportCancellation) -> ImportReport {
        let mut run = ImportRun::new(&rows);
        tracing::Span::current().record("batch_id", run.batch_id.as_str());
        info!(batch_id = %run.batch_id, total_rows = rows.len(), "开始导入客户数据");

        let guard = self.guard();

        // === 步骤 1: 存储预检 ===
        if cancel.is_cancelled() {
            return run.finish(Some(Halt::Cancelled));
        }
        if let Err(failure) = guard.preflight().await {
            error!(error = %failure, "存储预检失败，整批拒绝");
            return run.finish(Some(Halt::Rejected(failure.to_string())));
        }

        // === 步骤 2: 行规范化 ===
        debug!("步骤 2: 行规范化");
        let mut candidates: Vec<(usize, CandidateRecord)> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            match self.normalizer.normalize(row) {
                Ok(candidate) => {
                    run.slots[idx].nic = Some(candidate.nic.clone());
                    candidates.push((idx, candidate));
                }
                Err(e) => {
                    warn!(row = row.row_number, error = %e, "行解析失败");
                    run.parse_failed(idx, e.localized());
                }
            }
        }
        info!(parsed = candidates.len(), failed = rows.len() - candidates.len(), "行规范化完成");

        if cancel.is_cancelled() {
            return run.finish(Some(Halt::Cancelled));
        }

        // === 步骤 3: NIC 查询 + 校验折叠 ===
        debug!("步骤 3: 记录校验");
        let (persisted_nics, failed_nics) =
            match self.lookup_persisted_nics(&guard, &candidates).await {
                Ok(found) => found,
                Err(reason) => return run.finish(Some(Halt::Rejected(reason))),
            };

        let mut to_validate = Vec::with_capacity(candidates.len());
        for (idx, candidate) in candidates {
            match failed_nics.get(&candidate.nic) {
                Some(reason) => run.parse_failed(idx, reason.clone()),
                None => to_validate.push((idx, candidate)),
            }
        }

        let (indices, records): (Vec<usize>, Vec<CandidateRecord>) =
            to_validate.into_iter().unzip();
        let (results, accepted) = validate_batch(
            self.validator.as_ref(),
            records,
            self.config.today(),
            self.config.validation_mode,
            &persisted_nics,
        );

        let mut validated: Vec<(usize, CandidateRecord)> = Vec::with_capacity(results.len());
        for (idx, result) in indices.into_iter().zip(results) {
            match result {
                Ok(record) => validated.push((idx, record)),
                Err(errors) => {
                    warn!(row = run.slots[idx].row_number, errors = errors.len(), "行校验失败");
                    run.set(idx, RowOutcome::ValidationFailed { errors });
                }
            }
        }
        info!(valid = validated.len(), accepted_nics = accepted.len(), "记录校验完成");

        if cancel.is_cancelled() {
            return run.finish(Some(Halt::Cancelled));
        }

        // === 步骤 4: 亲属引用解析 ===
        debug!("步骤 4: 亲属引用解析");
        let batch: Vec<CandidateRecord> = validated.iter().map(|(_, c)| c.clone()).collect();
        let lookup = match self.lookup_references(&guard, &batch).await {
            Ok(lookup) => lookup,
            Err(reason) => return run.finish(Some(Halt::Rejected(reason))),
        };

        let mut resolvable = Vec::with_capacity(validated.len());
        for (idx, candidate) in validated {
            match candidate.family_refs.iter().find(|r| lookup.is_unverified(r)) {
                Some(reference) => {
                    let shown = reference.to_string();
                    run.parse_failed(
                        idx,
                        t_with_args("import.reference_unverified", &[("reference", &shown)]),
                    );
                }
                None => resolvable.push((idx, candidate)),
            }
        }

        let (indices, records): (Vec<usize>, Vec<CandidateRecord>) =
            resolvable.into_iter().unzip();
        let resolved: Vec<(usize, ResolvedCandidate)> = indices
            .into_iter()
            .zip(self.resolver.resolve(records, &lookup))
            .collect();

        if cancel.is_cancelled() {
            return run.finish(Some(Halt::Cancelled));
        }

        // === 步骤 5: 逐行落库 ===
        debug!("步骤 5: 逐行落库");
        let halt = self.persist(&guard, &mut run, resolved, cancel).await;

        // === 步骤 6: 汇总报告 ===
        run.finish(halt)
    }
}

#[async_trait::async_trait]
impl CustomerImporter for BatchCoordinator {
    #[instrument(skip(self, cancel), fields(batch_id))]
    async fn import_file(&self, file_path: &Path, cancel: &ImportCancellation) -> ImportReport {
        info!(file = %file_path.display(), "开始解析导入文件");

        let rows = match self.file_parser.parse_rows(file_path) {
            Ok(rows) => rows,
            Err(e) => return self.file_rejected(file_path, &e),
        };
        self.run(rows, cancel).await
    }

    #[instrument(skip_all, fields(batch_id, total_rows = rows.len()))]
    async fn import_rows(
        &self,
        rows: Vec<ImportRow>,
        cancel: &ImportCancellation,
    ) -> ImportReport {
        self.run(rows, cancel).await
    }
}
