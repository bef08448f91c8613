// ==========================================
// 薪资导入对账系统 - 协作方存储 Trait
// ==========================================
// 职责: 定义导入/对账所需的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{
    Contract, ContractState, Employee, ImportLine, ImportSheet, ImportUpload, InputType, NameMatch,
    NewPayslip, Payslip, PayslipInput, PayslipSlot, ReconcileOutcome, SalaryStructure,
    UpsertOutcome,
};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rust_decimal::Decimal;

// ==========================================
// EmployeeDirectory Trait
// ==========================================
// 用途: 员工查找（只读）
// 实现者: EmployeeRepository
pub trait EmployeeDirectory: Send + Sync {
    /// 按工号/条码精确匹配（只查在职员工），最多 1 条
    fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Employee>>;

    /// 按姓名不区分大小写的子串匹配（只查在职员工）
    ///
    /// # 返回
    /// - NameMatch.employee: 排序后的第一条（先到先得）
    /// - NameMatch.candidates: 命中总数
    fn find_by_name(&self, name: &str) -> RepositoryResult<NameMatch>;

    /// 按 ID 读取（含离职员工）
    fn get_employee(&self, employee_id: i64) -> RepositoryResult<Option<Employee>>;
}

// ==========================================
// InputTypeCatalog Trait
// ==========================================
// 用途: 工资单输入类型目录（只读，从不自动创建）
// 实现者: InputTypeRepository
pub trait InputTypeCatalog: Send + Sync {
    /// 按代码精确匹配，最多 1 条
    fn find_by_code(&self, code: &str) -> RepositoryResult<Option<InputType>>;
}

// ==========================================
// PayslipStore Trait
// ==========================================
// 用途: 合同/薪资结构/工资单/工资单输入
// 实现者: PayslipRepository
pub trait PayslipStore: Send + Sync {
    /// 查找员工处于指定状态的合同（最近开始的优先）
    fn find_active_contract(
        &self,
        employee_id: i64,
        states: &[ContractState],
    ) -> RepositoryResult<Option<Contract>>;

    /// 合同结构类型上配置的默认薪资结构
    fn find_default_structure(
        &self,
        structure_type_id: i64,
    ) -> RepositoryResult<Option<SalaryStructure>>;

    /// 系统中任意一个薪资结构（兜底）
    fn find_any_structure(&self) -> RepositoryResult<Option<SalaryStructure>>;

    /// 查找与期间重叠的工资单
    ///
    /// 重叠: existing.date_from <= date_to AND existing.date_to >= date_from
    fn find_overlapping_payslip(
        &self,
        employee_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Option<Payslip>>;

    /// 在同一写事务内复查重叠并插入（员工+期间唯一）
    ///
    /// # 返回
    /// - PayslipSlot::Existing: 并发方已创建，复用
    /// - PayslipSlot::Created: 新建成功
    fn create_payslip_if_absent(&self, payslip: &NewPayslip) -> RepositoryResult<PayslipSlot>;

    /// 按 (工资单, 输入类型) 覆盖写入金额与名称，不存在则新建
    fn upsert_input(
        &self,
        payslip_id: i64,
        input_type_id: i64,
        amount: Decimal,
        name: &str,
    ) -> RepositoryResult<(PayslipInput, UpsertOutcome)>;
}

// ==========================================
// ImportSheetStore Trait
// ==========================================
// 用途: 导入表聚合（表头 + 明细 + 附件）
// 实现者: ImportSheetRepository
pub trait ImportSheetStore: Send + Sync {
    fn create_sheet(&self, name: &str, month: u32, year: i32) -> RepositoryResult<ImportSheet>;

    fn get_sheet(&self, sheet_id: &str) -> RepositoryResult<Option<ImportSheet>>;

    /// 按期间列出导入表（创建时间升序）
    fn list_sheets(&self, month: u32, year: i32) -> RepositoryResult<Vec<ImportSheet>>;

    /// 明细按写入顺序（即源表行顺序）返回
    fn list_lines(&self, sheet_id: &str) -> RepositoryResult<Vec<ImportLine>>;

    /// 批量追加明细（事务化）
    fn insert_lines(&self, sheet_id: &str, lines: &[ImportLine]) -> RepositoryResult<usize>;

    /// 标记明细已应用（只会置 true）
    fn mark_line_applied(&self, line_id: &str) -> RepositoryResult<()>;

    /// 对账完成：state → done，并记录 outcome
    fn finish_sheet(&self, sheet_id: &str, outcome: ReconcileOutcome) -> RepositoryResult<()>;

    fn attach_file(&self, sheet_id: &str, upload: &ImportUpload) -> RepositoryResult<()>;

    fn load_file(&self, sheet_id: &str) -> RepositoryResult<Option<ImportUpload>>;

    fn clear_file(&self, sheet_id: &str) -> RepositoryResult<()>;

    fn delete_sheet(&self, sheet_id: &str) -> RepositoryResult<()>;
}

// ==========================================
// ReferenceSequence Trait
// ==========================================
// 用途: 导入表引用号序列
// 实现者: SequenceRepository
pub trait ReferenceSequence: Send + Sync {
    /// 取下一个序号（按 padding 补零）；序列未定义时返回 None
    fn next_by_code(&self, code: &str) -> RepositoryResult<Option<String>>;
}
