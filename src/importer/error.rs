// ==========================================
// 薪资导入对账系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 这里只放致命错误（导入前置条件/文件解析），
//       行级问题以 RowError 值累积，不走 Err
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 前置条件错误 =====
    #[error("Please choose an Excel file first.")]
    NoFileChosen,

    #[error("Please upload a file.")]
    EmptyPayload,

    #[error("Unsupported file format: {0} (supported: .xlsx/.xlsm/.xls/.ods/.csv)")]
    UnsupportedFormat(String),

    #[error("Import sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid import sheet header: {0}")]
    InvalidSheetHeader(String),

    // ===== 文件相关错误 =====
    #[error("Unable to read workbook: {0}")]
    ExcelParseError(String),

    #[error("Unable to read CSV: {0}")]
    CsvParseError(String),

    #[error("Unable to decode upload: {0}")]
    PayloadDecodeError(String),

    // ===== 下游错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<base64::DecodeError>
impl From<base64::DecodeError> for ImportError {
    fn from(err: base64::DecodeError) -> Self {
        ImportError::PayloadDecodeError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
