// ==========================================
// 薪资导入对账系统 - 工资单相关实体
// ==========================================
// 职责: 外部协作方实体（员工/输入类型/合同/薪资结构/工资单）
// 说明: 本系统只引用不拥有，输入类型目录只读
// ==========================================

use crate::domain::types::ContractState;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Employee - 员工
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: i64,
    pub code: Option<String>, // 工号/条码
    pub name: String,
    pub active: bool,
}

/// 按姓名模糊匹配结果
///
/// `candidates` 为命中的总人数；大于 1 时调用方可判定存在歧义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub employee: Option<Employee>,
    pub candidates: usize,
}

impl NameMatch {
    pub fn none() -> Self {
        Self {
            employee: None,
            candidates: 0,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

// ==========================================
// InputType - 工资单输入类型（目录）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputType {
    pub input_type_id: i64,
    pub code: String,
    pub name: String,
}

// ==========================================
// 合同 / 薪资结构
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: i64,
    pub employee_id: i64,
    pub state: ContractState,
    pub structure_type_id: Option<i64>,
    pub date_start: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureType {
    pub structure_type_id: i64,
    pub name: String,
    pub default_struct_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryStructure {
    pub struct_id: i64,
    pub name: String,
    pub structure_type_id: Option<i64>,
}

// ==========================================
// Payslip / PayslipInput
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payslip {
    pub payslip_id: i64,
    pub employee_id: i64,
    pub contract_id: Option<i64>,
    pub struct_id: Option<i64>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

/// 新建工资单草稿（尚未落库）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayslip {
    pub employee_id: i64,
    pub contract_id: i64,
    pub struct_id: i64,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipInput {
    pub input_id: i64,
    pub payslip_id: i64,
    pub input_type_id: i64,
    pub amount: Decimal,
    pub name: String,
}

/// 工资单查找或创建的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayslipSlot {
    Existing(Payslip),
    Created(Payslip),
}

impl PayslipSlot {
    pub fn payslip(&self) -> &Payslip {
        match self {
            PayslipSlot::Existing(p) | PayslipSlot::Created(p) => p,
        }
    }
}

/// 工资单输入 upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}
