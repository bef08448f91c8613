// ==========================================
// 薪资导入对账系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为调用方可读的错误消息
// 说明: 导入/对账的致命错误文本原样透出（调用方按文本提示用户）
// ==========================================

use crate::config::ConfigError;
use crate::engine::ReconcileError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 导入/对账错误
    // ==========================================
    #[error("{0}")]
    ImportFailed(String),

    #[error("{0}")]
    ReconcileFailed(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::SheetNotFound(id) => ApiError::NotFound(format!("ImportSheet(id={})不存在", id)),
            ImportError::InvalidSheetHeader(msg) => ApiError::InvalidInput(msg),
            ImportError::Repository(e) => e.into(),
            ImportError::Config(e) => e.into(),
            other => ApiError::ImportFailed(other.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::SheetNotFound(id) => {
                ApiError::NotFound(format!("ImportSheet(id={})不存在", id))
            }
            ReconcileError::Repository(e) => e.into(),
            ReconcileError::Config(e) => e.into(),
            other => ApiError::ReconcileFailed(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_import_message_passes_through() {
        let err: ApiError = ImportError::NoFileChosen.into();
        assert_eq!(err.to_string(), "Please choose an Excel file first.");
    }

    #[test]
    fn test_reconcile_message_passes_through() {
        let err: ApiError = ReconcileError::NoSalaryStructure {
            employee: "Alice Perera".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "No salary structure for employee Alice Perera");
    }

    #[test]
    fn test_not_found_mapping() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "ImportSheet".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
