// ==========================================
// 薪资导入对账系统 - 工资单对账引擎
// ==========================================
// 职责: 导入表明细 → 工资单输入（幂等 upsert）
// 流程（每条明细，按写入顺序）:
//   1. 期间 = 导入表月份的自然月
//   2. 查找与期间重叠的工资单；没有则按合同 + 薪资结构新建
//   3. 按 (工资单, 输入类型) 覆盖写入金额与名称
//   4. 明细标记为已应用
// 红线:
// - 无有效合同 → 跳过并报告，不中断
// - 任何地方都没有薪资结构 → 致命错误，已处理的明细保持已提交
// - 全部处理后导入表置为 done（单向）
// ==========================================

use crate::config::{ConfigError, ImportConfigReader};
use crate::domain::{
    ApplySummary, ContractState, ImportLine, LineSkip, NewPayslip, Payslip, PayslipSlot,
    ReconcileOutcome, SalaryStructure, SkipReason, UpsertOutcome,
};
use crate::engine::pay_period::PayPeriod;
use crate::repository::{
    EmployeeDirectory, ImportSheetStore, PayslipStore, RepositoryError, RepositoryResult,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// 对账致命错误
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Import sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid pay period: {month}/{year}")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("No salary structure for employee {employee}")]
    NoSalaryStructure { employee: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// 单条明细的处理结果
enum LineOutcome {
    Applied {
        payslip_created: bool,
        input: UpsertOutcome,
    },
    Skipped(SkipReason),
}

// ==========================================
// PayslipReconciler - 工资单对账引擎
// ==========================================
pub struct PayslipReconciler {
    sheets: Arc<dyn ImportSheetStore>,
    payslips: Arc<dyn PayslipStore>,
    employees: Arc<dyn EmployeeDirectory>,
    config: Arc<dyn ImportConfigReader>,
}

impl PayslipReconciler {
    pub fn new(
        sheets: Arc<dyn ImportSheetStore>,
        payslips: Arc<dyn PayslipStore>,
        employees: Arc<dyn EmployeeDirectory>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            sheets,
            payslips,
            employees,
            config,
        }
    }

    /// 将导入表应用到工资单
    ///
    /// # 返回
    /// - Ok(ApplySummary): 处理计数 + 跳过明细 + outcome
    /// - Err(NoSalaryStructure): 中途致命，之前的明细已提交，导入表保持原状态
    ///
    /// # 幂等
    /// 重复执行只会覆盖同一 (工资单, 输入类型) 的金额，不会新增输入
    #[instrument(skip(self))]
    pub fn apply(&self, sheet_id: &str) -> ReconcileResult<ApplySummary> {
        let sheet = self
            .sheets
            .get_sheet(sheet_id)?
            .ok_or_else(|| ReconcileError::SheetNotFound(sheet_id.to_string()))?;

        let period = PayPeriod::for_month(sheet.year, sheet.month).ok_or(
            ReconcileError::InvalidPeriod {
                month: sheet.month,
                year: sheet.year,
            },
        )?;
        let contract_states = self.config.get_contract_states()?;
        let lines = self.sheets.list_lines(sheet_id)?;

        info!(
            sheet_id = %sheet_id,
            lines = lines.len(),
            date_from = %period.date_from,
            date_to = %period.date_to,
            "开始对账"
        );

        let mut summary = ApplySummary {
            sheet_id: sheet_id.to_string(),
            applied_lines: 0,
            payslips_created: 0,
            inputs_created: 0,
            inputs_updated: 0,
            skipped: Vec::new(),
            outcome: ReconcileOutcome::Done,
        };

        for line in &lines {
            match self.apply_line(line, &period, &contract_states)? {
                LineOutcome::Applied {
                    payslip_created,
                    input,
                } => {
                    self.sheets.mark_line_applied(&line.line_id)?;
                    summary.applied_lines += 1;
                    if payslip_created {
                        summary.payslips_created += 1;
                    }
                    match input {
                        UpsertOutcome::Created => summary.inputs_created += 1,
                        UpsertOutcome::Updated => summary.inputs_updated += 1,
                    }
                }
                LineOutcome::Skipped(reason) => {
                    warn!(
                        line_id = %line.line_id,
                        source_row = line.source_row,
                        employee_id = line.employee_id,
                        reason = %reason,
                        "明细跳过"
                    );
                    summary.skipped.push(LineSkip {
                        line_id: line.line_id.clone(),
                        source_row: line.source_row,
                        employee_id: line.employee_id,
                        reason,
                    });
                }
            }
        }

        if !summary.skipped.is_empty() {
            summary.outcome = ReconcileOutcome::DoneWithSkips;
        }
        self.sheets.finish_sheet(sheet_id, summary.outcome)?;

        info!(
            sheet_id = %sheet_id,
            applied = summary.applied_lines,
            payslips_created = summary.payslips_created,
            inputs_created = summary.inputs_created,
            inputs_updated = summary.inputs_updated,
            skipped = summary.skipped.len(),
            outcome = %summary.outcome,
            "对账完成"
        );

        Ok(summary)
    }

    fn apply_line(
        &self,
        line: &ImportLine,
        period: &PayPeriod,
        contract_states: &[ContractState],
    ) -> ReconcileResult<LineOutcome> {
        let (payslip, payslip_created) =
            match self.find_or_create_payslip(line.employee_id, period, contract_states)? {
                Some(found) => found,
                None => return Ok(LineOutcome::Skipped(SkipReason::NoActiveContract)),
            };

        let (_, input) = self.payslips.upsert_input(
            payslip.payslip_id,
            line.input_type_id,
            line.amount,
            &line.description,
        )?;

        debug!(
            line_id = %line.line_id,
            payslip_id = payslip.payslip_id,
            input_type_id = line.input_type_id,
            amount = %line.amount,
            "工资单输入已写入"
        );

        Ok(LineOutcome::Applied {
            payslip_created,
            input,
        })
    }

    /// 查找期间内的工资单，没有则新建
    ///
    /// # 返回
    /// - Some((payslip, created))
    /// - None: 员工无有效合同
    fn find_or_create_payslip(
        &self,
        employee_id: i64,
        period: &PayPeriod,
        contract_states: &[ContractState],
    ) -> ReconcileResult<Option<(Payslip, bool)>> {
        if let Some(existing) =
            self.payslips
                .find_overlapping_payslip(employee_id, period.date_from, period.date_to)?
        {
            return Ok(Some((existing, false)));
        }

        let Some(contract) = self
            .payslips
            .find_active_contract(employee_id, contract_states)?
        else {
            return Ok(None);
        };

        let structure = match self.resolve_structure(contract.structure_type_id)? {
            Some(s) => s,
            None => {
                return Err(ReconcileError::NoSalaryStructure {
                    employee: self.employee_label(employee_id)?,
                })
            }
        };

        let slot = self.payslips.create_payslip_if_absent(&NewPayslip {
            employee_id,
            contract_id: contract.contract_id,
            struct_id: structure.struct_id,
            date_from: period.date_from,
            date_to: period.date_to,
        })?;

        let created = matches!(slot, PayslipSlot::Created(_));
        if created {
            info!(
                employee_id,
                contract_id = contract.contract_id,
                struct_id = structure.struct_id,
                "工资单已创建"
            );
        }
        Ok(Some((slot.payslip().clone(), created)))
    }

    /// 合同结构类型的默认结构，否则任意结构
    fn resolve_structure(
        &self,
        structure_type_id: Option<i64>,
    ) -> RepositoryResult<Option<SalaryStructure>> {
        if let Some(type_id) = structure_type_id {
            if let Some(structure) = self.payslips.find_default_structure(type_id)? {
                return Ok(Some(structure));
            }
        }
        self.payslips.find_any_structure()
    }

    fn employee_label(&self, employee_id: i64) -> RepositoryResult<String> {
        Ok(self
            .employees
            .get_employee(employee_id)?
            .map(|e| e.name)
            .unwrap_or_else(|| employee_id.to_string()))
    }
}
