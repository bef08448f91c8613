// ==========================================
// 薪资导入对账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod import_sheet;
pub mod payroll;
pub mod types;

// 重导出核心类型
pub use import_sheet::{
    format_reference, ApplySummary, ImportLine, ImportRow, ImportSheet, ImportSummary,
    ImportUpload, LineSkip, NewSheet, Notification, RowError, RowWarning, SheetTarget,
    FALLBACK_SEQUENCE,
};
pub use payroll::{
    Contract, Employee, InputType, NameMatch, NewPayslip, Payslip, PayslipInput, PayslipSlot,
    SalaryStructure, StructureType, UpsertOutcome,
};
pub use types::{ContractState, NotificationLevel, ReconcileOutcome, SheetState, SkipReason};
