// ==========================================
// 薪资导入对账系统 - 导入层
// ==========================================
// 职责: 表格上传 → 导入表明细（含行级错误报告）
// 支持: Excel (.xlsx/.xlsm/.xls), ODS, CSV
// ==========================================

// 模块声明
pub mod entity_resolver;
pub mod error;
pub mod file_parser;
pub mod import_batch;
pub mod row_parser;

// 重导出核心类型
pub use entity_resolver::{describe, EntityResolver, Resolution};
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    read_upload, CellValue, CsvSheetReader, SheetReader, SheetRow, SpreadsheetFormat,
    WorkbookSheetReader,
};
pub use import_batch::{validate_period, ImportBatch};
pub use row_parser::{coerce_amount, RowParser};
