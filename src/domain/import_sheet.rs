// ==========================================
// 薪资导入对账系统 - 导入表聚合
// ==========================================
// 职责: 导入表（表头 + 明细）、行级错误、导入/对账汇总
// 说明: ImportRow 只在解析期间存在，不落库
// ==========================================

use crate::domain::types::{NotificationLevel, ReconcileOutcome, SheetState, SkipReason};
use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 引用号序列缺失时的兜底值
pub const FALLBACK_SEQUENCE: &str = "001";

// ==========================================
// ImportRow - 解析后的单行（瞬态）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub row_number: usize, // 源表行号（1 起，含表头）
    pub employee_code: Option<String>,
    pub employee_name: Option<String>,
    pub input_type_code: String,
    pub amount: Decimal,
    pub notes: Option<String>,
}

// ==========================================
// RowError - 行级可恢复错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// 行级提示（不阻断，例如姓名匹配到多名员工）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWarning {
    pub row: usize,
    pub message: String,
}

// ==========================================
// ImportLine - 导入明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLine {
    pub line_id: String,
    pub sheet_id: String,
    pub source_row: usize,
    pub employee_id: i64,
    pub input_type_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub applied: bool,
}

// ==========================================
// ImportSheet - 导入表表头
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSheet {
    pub sheet_id: String,
    pub name: String,
    pub month: u32,
    pub year: i32,
    pub state: SheetState,
    pub outcome: Option<ReconcileOutcome>,
    pub import_filename: Option<String>,
    pub has_file: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建导入表参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSheet {
    /// 显式引用号；为空时按序列生成 `<seq>/<MM>/<YYYY>`
    pub name: Option<String>,
    pub month: u32,
    pub year: i32,
}

/// 导入目标：已有导入表或新建
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetTarget {
    Existing(String),
    New(NewSheet),
}

// ==========================================
// ImportUpload - 上传的表格文件
// ==========================================
// 导入即消费：导入结束后附件被清空，重跑需要重新上传
#[derive(Clone, PartialEq, Eq)]
pub struct ImportUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl ImportUpload {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
        }
    }

    /// 解码 base64 上传内容（前后空白忽略）
    pub fn from_base64(
        file_name: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, base64::DecodeError> {
        let content = general_purpose::STANDARD.decode(encoded.trim())?;
        Ok(Self::new(file_name, content))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for ImportUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// 组装导入表引用号
pub fn format_reference(sequence: &str, month: u32, year: i32) -> String {
    format!("{}/{:02}/{}", sequence, month, year)
}

// ==========================================
// ImportSummary - 导入结果（供调用方渲染通知）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub sheet_id: String,
    pub sheet_name: String,
    pub created_count: usize,
    pub errors: Vec<RowError>,
    pub warnings: Vec<RowWarning>,
}

/// 通知内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
}

impl ImportSummary {
    /// 渲染为通知（有行错误时降级为 info）
    pub fn notification(&self) -> Notification {
        let mut message = format!("Imported {} rows.", self.created_count);
        if !self.errors.is_empty() {
            message.push_str("\nErrors:\n");
            let lines: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
            message.push_str(&lines.join("\n"));
        }

        Notification {
            title: "Import Result".to_string(),
            message,
            level: if self.errors.is_empty() {
                NotificationLevel::Success
            } else {
                NotificationLevel::Info
            },
        }
    }
}

// ==========================================
// ApplySummary - 对账结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSkip {
    pub line_id: String,
    pub source_row: usize,
    pub employee_id: i64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub sheet_id: String,
    pub applied_lines: usize,
    pub payslips_created: usize,
    pub inputs_created: usize,
    pub inputs_updated: usize,
    pub skipped: Vec<LineSkip>,
    pub outcome: ReconcileOutcome,
}
