// ==========================================
// 薪资导入对账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod employee_repo;
pub mod error;
pub mod import_sheet_repo;
pub mod input_type_repo;
pub mod payroll_store;
pub mod payslip_repo;
pub mod sequence_repo;

// 重导出核心仓储
pub use employee_repo::EmployeeRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_sheet_repo::ImportSheetRepository;
pub use input_type_repo::InputTypeRepository;
pub use payroll_store::{
    EmployeeDirectory, ImportSheetStore, InputTypeCatalog, PayslipStore, ReferenceSequence,
};
pub use payslip_repo::PayslipRepository;
pub use sequence_repo::SequenceRepository;
