// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、仓储组装、主数据种子
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use payroll_import::db::open_shared_connection;
use payroll_import::domain::{ContractState, Employee, InputType, SalaryStructure};
use payroll_import::repository::{
    EmployeeRepository, ImportSheetRepository, InputTypeRepository, PayslipRepository,
    SequenceRepository,
};
use payroll_import::{ImportUpload, PayrollImportApi};
use rusqlite::Connection;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 测试环境（临时数据库文件 + API + 种子用仓储）
pub struct TestEnv {
    // 需要保持存活，否则临时文件被删除
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub api: PayrollImportApi,
    pub employees: EmployeeRepository,
    pub input_types: InputTypeRepository,
    pub payslips: PayslipRepository,
    pub sheets: ImportSheetRepository,
    pub sequences: SequenceRepository,
}

/// 创建临时测试数据库并初始化全部表
pub fn create_test_env() -> TestEnv {
    let temp_file = NamedTempFile::new().expect("create temp db");
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let conn = open_shared_connection(&db_path).expect("open db");

    let api = PayrollImportApi::from_connection(conn.clone()).expect("init api");

    TestEnv {
        employees: EmployeeRepository::from_connection(conn.clone()).unwrap(),
        input_types: InputTypeRepository::from_connection(conn.clone()).unwrap(),
        payslips: PayslipRepository::from_connection(conn.clone()).unwrap(),
        sheets: ImportSheetRepository::from_connection(conn.clone()).unwrap(),
        sequences: SequenceRepository::from_connection(conn.clone()).unwrap(),
        _temp_file: temp_file,
        db_path,
        conn,
        api,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 常用输入类型: TRN / DED
pub fn seed_input_types(env: &TestEnv) -> (InputType, InputType) {
    let trn = env
        .input_types
        .insert("TRN", "Transport Allowance")
        .unwrap();
    let ded = env.input_types.insert("DED", "Deduction").unwrap();
    (trn, ded)
}

/// 带默认薪资结构的结构类型
pub fn seed_structure(env: &TestEnv) -> (i64, SalaryStructure) {
    let st = env.payslips.insert_structure_type("Regular", None).unwrap();
    let structure = env
        .payslips
        .insert_structure("Regular Pay", Some(st.structure_type_id))
        .unwrap();
    env.payslips
        .set_default_structure(st.structure_type_id, Some(structure.struct_id))
        .unwrap();
    (st.structure_type_id, structure)
}

/// 在职员工 + 执行中合同
pub fn seed_employee_with_contract(
    env: &TestEnv,
    code: &str,
    name: &str,
    structure_type_id: Option<i64>,
) -> Employee {
    let employee = env.employees.insert(Some(code), name).unwrap();
    env.payslips
        .insert_contract(
            employee.employee_id,
            ContractState::Open,
            structure_type_id,
            date(2024, 1, 1),
        )
        .unwrap();
    employee
}

/// 组装 CSV 上传（首行为表头）
pub fn csv_upload(data_rows: &[&str]) -> ImportUpload {
    let mut content = String::from("Employee Code,Employee Name,Input Type,Amount,Notes\n");
    for row in data_rows {
        content.push_str(row);
        content.push('\n');
    }
    ImportUpload::new("payroll.csv", content.into_bytes())
}

/// 组装 xlsx 上传（首行写入表头，数据行由调用方写入）
pub fn xlsx_upload(fill: impl FnOnce(&mut Worksheet)) -> ImportUpload {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in ["Employee Code", "Employee Name", "Input Type", "Amount", "Notes"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    fill(sheet);
    let content = workbook.save_to_buffer().expect("build xlsx");
    ImportUpload::new("payroll.xlsx", content)
}
