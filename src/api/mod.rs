// ==========================================
// 薪资导入对账系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行/宿主程序调用
// ==========================================

pub mod error;
pub mod payroll_import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use payroll_import_api::PayrollImportApi;
