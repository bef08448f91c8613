// ==========================================
// 薪资导入对账系统 - 行解析器
// ==========================================
// 职责: 单行单元格 → ImportRow 或 RowError
// 红线: 不做任何查找，纯函数
// ==========================================
// 列布局（按位置）:
//   0 员工工号 | 1 员工姓名 | 2 输入类型代码 | 3 金额 | 4 备注
// 缺失的尾部列视为空，第 5 列之后忽略
// ==========================================

use crate::domain::{ImportRow, RowError};
use crate::importer::file_parser::{CellValue, SheetRow};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const COL_EMPLOYEE_CODE: usize = 0;
pub const COL_EMPLOYEE_NAME: usize = 1;
pub const COL_INPUT_TYPE_CODE: usize = 2;
pub const COL_AMOUNT: usize = 3;
pub const COL_NOTES: usize = 4;

pub const MSG_INVALID_AMOUNT: &str = "Invalid amount value";
pub const MSG_INPUT_TYPE_REQUIRED: &str = "Input Type Code is required";

#[derive(Debug, Default, Clone, Copy)]
pub struct RowParser;

impl RowParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析一行
    ///
    /// # 校验顺序
    /// 1. 金额无法转换 → "Invalid amount value"
    /// 2. 输入类型代码为空 → "Input Type Code is required"
    pub fn parse(&self, row: &SheetRow) -> Result<ImportRow, RowError> {
        let amount = coerce_amount(row.cell(COL_AMOUNT))
            .ok_or_else(|| RowError::new(row.row_number, MSG_INVALID_AMOUNT))?;

        let input_type_code = row
            .cell(COL_INPUT_TYPE_CODE)
            .as_text()
            .ok_or_else(|| RowError::new(row.row_number, MSG_INPUT_TYPE_REQUIRED))?;

        Ok(ImportRow {
            row_number: row.row_number,
            employee_code: row.cell(COL_EMPLOYEE_CODE).as_text(),
            employee_name: row.cell(COL_EMPLOYEE_NAME).as_text(),
            input_type_code,
            amount,
            notes: row.cell(COL_NOTES).as_text(),
        })
    }
}

/// 金额转换：空 → 0；文本按十进制（含科学计数法）解析；浮点非有限值视为非法
pub fn coerce_amount(cell: &CellValue) -> Option<Decimal> {
    match cell {
        CellValue::Empty => Some(Decimal::ZERO),
        CellValue::Int(i) => Some(Decimal::from(*i)),
        CellValue::Float(f) => Decimal::from_f64(*f),
        CellValue::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Decimal::ZERO);
            }
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
    }
}
