// ==========================================
// 薪资导入对账系统 - 实体解析器
// ==========================================
// 职责: ImportRow → 未应用的 ImportLine 或 RowError
// 规则:
// - 员工: 工号精确匹配优先；未命中且有姓名时按姓名模糊匹配（先到先得）
// - 输入类型: 代码精确匹配；未命中报错，从不自动创建
// 红线: 纯查找，不写库
// ==========================================

use crate::domain::{Employee, ImportLine, ImportRow, InputType, RowError, RowWarning};
use crate::repository::{EmployeeDirectory, InputTypeCatalog, RepositoryResult};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 单行解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Line {
        line: ImportLine,
        warning: Option<RowWarning>,
    },
    Rejected(RowError),
}

pub struct EntityResolver {
    employees: Arc<dyn EmployeeDirectory>,
    input_types: Arc<dyn InputTypeCatalog>,
}

impl EntityResolver {
    pub fn new(
        employees: Arc<dyn EmployeeDirectory>,
        input_types: Arc<dyn InputTypeCatalog>,
    ) -> Self {
        Self {
            employees,
            input_types,
        }
    }

    /// 解析一行
    ///
    /// # 返回
    /// - Ok(Resolution::Line): 可落库的明细（可能附带姓名歧义提示）
    /// - Ok(Resolution::Rejected): 行级错误
    /// - Err: 存储访问失败（致命）
    pub fn resolve(&self, sheet_id: &str, row: &ImportRow) -> RepositoryResult<Resolution> {
        let (employee, warning) = match self.resolve_employee(row)? {
            Some(found) => found,
            None => {
                return Ok(Resolution::Rejected(RowError::new(
                    row.row_number,
                    format!(
                        "Employee not found: {}/{}",
                        row.employee_code.as_deref().unwrap_or(""),
                        row.employee_name.as_deref().unwrap_or("")
                    ),
                )))
            }
        };

        let code = row.input_type_code.trim();
        let input_type = match self.input_types.find_by_code(code)? {
            Some(t) => t,
            None => {
                return Ok(Resolution::Rejected(RowError::new(
                    row.row_number,
                    format!(
                        "Input Type not found: {}. Create it in catalog configuration first.",
                        code
                    ),
                )))
            }
        };

        let line = ImportLine {
            line_id: Uuid::new_v4().to_string(),
            sheet_id: sheet_id.to_string(),
            source_row: row.row_number,
            employee_id: employee.employee_id,
            input_type_id: input_type.input_type_id,
            amount: row.amount,
            description: describe(&input_type, row.notes.as_deref()),
            applied: false,
        };

        Ok(Resolution::Line { line, warning })
    }

    fn resolve_employee(
        &self,
        row: &ImportRow,
    ) -> RepositoryResult<Option<(Employee, Option<RowWarning>)>> {
        if let Some(code) = row.employee_code.as_deref() {
            if let Some(employee) = self.employees.find_by_code(code)? {
                return Ok(Some((employee, None)));
            }
            debug!(row_number = row.row_number, code = %code, "工号未命中，尝试按姓名匹配");
        }

        let Some(name) = row.employee_name.as_deref() else {
            return Ok(None);
        };

        let matched = self.employees.find_by_name(name)?;
        let warning = if matched.is_ambiguous() {
            matched.employee.as_ref().map(|e| RowWarning {
                row: row.row_number,
                message: format!(
                    "Employee name '{}' matched {} employees; using {}",
                    name, matched.candidates, e.name
                ),
            })
        } else {
            None
        };

        Ok(matched.employee.map(|e| (e, warning)))
    }
}

/// 明细描述: 输入类型名称，有备注时追加 " - 备注"
pub fn describe(input_type: &InputType, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("{} - {}", input_type.name, n),
        None => input_type.name.clone(),
    }
}
