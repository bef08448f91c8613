// ==========================================
// 导入流程集成测试
// ==========================================
// 测试目标: 表格 → 导入表明细 + 行级错误报告
// ==========================================

mod test_helpers;

use base64::engine::general_purpose;
use base64::Engine as _;
use payroll_import::domain::NotificationLevel;
use payroll_import::repository::{ImportSheetStore, ReferenceSequence};
use payroll_import::{logging, ApiError, NewSheet, RowError, SheetState, SheetTarget};
use rust_decimal_macros::dec;
use test_helpers::{create_test_env, csv_upload, seed_input_types, xlsx_upload};

fn new_sheet(month: u32, year: i32) -> SheetTarget {
    SheetTarget::New(NewSheet {
        name: None,
        month,
        year,
    })
}

#[test]
fn test_end_to_end_row_errors_do_not_stop_import() {
    logging::init_test();
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let upload = csv_upload(&["E001,,TRN,150.50,", "E001,,TRN,abc,", "E001,,ZZZ,10,"]);
    let summary = env.api.import_file(&new_sheet(3, 2025), &upload).unwrap();

    assert_eq!(summary.created_count, 1);
    assert_eq!(
        summary.errors,
        vec![
            RowError::new(3, "Invalid amount value"),
            RowError::new(
                4,
                "Input Type not found: ZZZ. Create it in catalog configuration first."
            ),
        ]
    );

    let lines = env.api.list_lines(&summary.sheet_id).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].source_row, 2);
    assert_eq!(lines[0].amount, dec!(150.50));
    assert_eq!(lines[0].description, "Transport Allowance");
    assert!(!lines[0].applied);

    let n = summary.notification();
    assert_eq!(n.level, NotificationLevel::Info);
    assert!(n.message.starts_with("Imported 1 rows.\nErrors:\nRow 3: Invalid amount value"));
}

#[test]
fn test_row_level_messages() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let upload = csv_upload(&[
        "E999,Ghost,TRN,10,",
        "E001,,,10,",
        ",,,,",
        "E001,,DED,-25,late arrival",
    ]);
    let summary = env.api.import_file(&new_sheet(3, 2025), &upload).unwrap();

    assert_eq!(summary.created_count, 1);
    assert_eq!(
        summary.errors,
        vec![
            RowError::new(2, "Employee not found: E999/Ghost"),
            RowError::new(3, "Input Type Code is required"),
        ]
    );

    let lines = env.api.list_lines(&summary.sheet_id).unwrap();
    // 空白行被跳过，但行号沿用表格行号
    assert_eq!(lines[0].source_row, 5);
    assert_eq!(lines[0].amount, dec!(-25));
    assert_eq!(lines[0].description, "Deduction - late arrival");
}

#[test]
fn test_code_preferred_and_name_fallback() {
    let env = create_test_env();
    seed_input_types(&env);
    let alice = env.employees.insert(Some("E001"), "Alice Perera").unwrap();
    let nimal = env.employees.insert(Some("E002"), "Nimal Silva").unwrap();

    let upload = csv_upload(&["E001,Nimal Silva,TRN,1,", ",nimal,TRN,2,"]);
    let summary = env.api.import_file(&new_sheet(3, 2025), &upload).unwrap();
    assert!(summary.errors.is_empty());

    let lines = env.api.list_lines(&summary.sheet_id).unwrap();
    assert_eq!(lines[0].employee_id, alice.employee_id);
    assert_eq!(lines[1].employee_id, nimal.employee_id);
}

#[test]
fn test_ambiguous_name_is_reported_as_warning() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E002"), "Nimal Silva").unwrap();
    env.employees.insert(Some("E003"), "Kamal Silva").unwrap();

    let summary = env
        .api
        .import_file(&new_sheet(3, 2025), &csv_upload(&[",Silva,TRN,5,"]))
        .unwrap();

    assert_eq!(summary.created_count, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].row, 2);
    assert_eq!(summary.notification().level, NotificationLevel::Success);
}

#[test]
fn test_archived_employee_not_found() {
    let env = create_test_env();
    seed_input_types(&env);
    let e = env.employees.insert(Some("E009"), "Sunil Fernando").unwrap();
    env.employees.set_active(e.employee_id, false).unwrap();

    let summary = env
        .api
        .import_file(&new_sheet(3, 2025), &csv_upload(&["E009,,TRN,5,"]))
        .unwrap();
    assert_eq!(summary.created_count, 0);
    assert_eq!(summary.errors[0].message, "Employee not found: E009/");
}

#[test]
fn test_reference_generated_from_sequence() {
    let env = create_test_env();
    env.api.define_sequence("payroll.import", 7, 3).unwrap();

    let sheet = env
        .api
        .create_sheet(&NewSheet {
            name: None,
            month: 3,
            year: 2025,
        })
        .unwrap();
    assert_eq!(sheet.name, "007/03/2025");
    assert_eq!(sheet.state, SheetState::Draft);
    assert_eq!(
        env.sequences.next_by_code("payroll.import").unwrap().as_deref(),
        Some("008")
    );
}

#[test]
fn test_attached_file_flow() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let sheet = env
        .api
        .create_sheet(&NewSheet {
            name: Some("IMPORT/2025/3".to_string()),
            month: 3,
            year: 2025,
        })
        .unwrap();
    assert_eq!(sheet.name, "IMPORT/2025/3");

    let upload = csv_upload(&["E001,,TRN,150.50,March bus"]);
    let encoded = general_purpose::STANDARD.encode(&upload.content);
    env.api
        .attach_file_base64(&sheet.sheet_id, "march.csv", &encoded)
        .unwrap();
    assert!(env.api.get_sheet(&sheet.sheet_id).unwrap().has_file);

    let summary = env.api.import_attached(&sheet.sheet_id).unwrap();
    assert_eq!(summary.created_count, 1);
    assert_eq!(summary.sheet_name, "IMPORT/2025/3");

    // 导入后附件被清空，重复导入需重新上传
    let reloaded = env.api.get_sheet(&sheet.sheet_id).unwrap();
    assert!(!reloaded.has_file);
    assert_eq!(reloaded.import_filename.as_deref(), Some("march.csv"));
    let err = env.api.import_attached(&sheet.sheet_id).unwrap_err();
    assert_eq!(err.to_string(), "Please choose an Excel file first.");

    let lines = env.api.list_lines(&sheet.sheet_id).unwrap();
    assert_eq!(lines[0].description, "Transport Allowance - March bus");
}

#[test]
fn test_reimport_into_existing_sheet_appends_lines() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let first = env
        .api
        .import_file(&new_sheet(3, 2025), &csv_upload(&["E001,,TRN,1,"]))
        .unwrap();
    let target = SheetTarget::Existing(first.sheet_id.clone());
    env.api
        .import_file(&target, &csv_upload(&["E001,,DED,2,"]))
        .unwrap();

    let lines = env.sheets.list_lines(&first.sheet_id).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].amount, dec!(2));
}

#[test]
fn test_fatal_preconditions() {
    let env = create_test_env();

    let err = env
        .api
        .import_file(&SheetTarget::Existing("missing".to_string()), &csv_upload(&[]))
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = env
        .api
        .import_file(
            &new_sheet(13, 2025),
            &csv_upload(&["E001,,TRN,1,"]),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = env
        .api
        .import_file_base64(&new_sheet(3, 2025), "march.csv", "%%%")
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportFailed(_)));

    // 致命错误不创建导入表
    assert!(env.api.list_sheets(3, 2025).unwrap().is_empty());
}

#[test]
fn test_delete_sheet_removes_lines() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let summary = env
        .api
        .import_file(&new_sheet(3, 2025), &csv_upload(&["E001,,TRN,1,"]))
        .unwrap();
    env.api.delete_sheet(&summary.sheet_id).unwrap();

    assert!(env.sheets.list_lines(&summary.sheet_id).unwrap().is_empty());
    assert!(matches!(
        env.api.get_sheet(&summary.sheet_id),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_xlsx_numeric_cells_and_row_numbers() {
    let env = create_test_env();
    seed_input_types(&env);
    let employee = env.employees.insert(Some("1001"), "Alice Perera").unwrap();

    let upload = xlsx_upload(|sheet| {
        sheet.write_number(1, 0, 1001.0).unwrap();
        sheet.write_string(1, 2, "TRN").unwrap();
        sheet.write_number(1, 3, 150.5).unwrap();
        sheet.write_string(1, 4, "March bus").unwrap();

        sheet.write_string(2, 0, "1001").unwrap();
        sheet.write_string(2, 2, "TRN").unwrap();
        sheet.write_string(2, 3, "abc").unwrap();

        // 第 4 行留空
        sheet.write_number(4, 0, 1001.0).unwrap();
        sheet.write_string(4, 2, "ZZZ").unwrap();
        sheet.write_number(4, 3, 1.0).unwrap();
    });
    let summary = env.api.import_file(&new_sheet(3, 2025), &upload).unwrap();

    assert_eq!(summary.created_count, 1);
    assert_eq!(
        summary.errors,
        vec![
            RowError::new(3, "Invalid amount value"),
            RowError::new(
                5,
                "Input Type not found: ZZZ. Create it in catalog configuration first."
            ),
        ]
    );

    let lines = env.api.list_lines(&summary.sheet_id).unwrap();
    assert_eq!(lines[0].employee_id, employee.employee_id);
    assert_eq!(lines[0].amount, dec!(150.5));
    assert_eq!(lines[0].description, "Transport Allowance - March bus");
}

#[test]
fn test_csv_blank_line_keeps_sheet_row_numbers() {
    let env = create_test_env();
    seed_input_types(&env);
    env.employees.insert(Some("E001"), "Alice Perera").unwrap();

    let summary = env
        .api
        .import_file(&new_sheet(3, 2025), &csv_upload(&["", "E001,,TRN,abc,"]))
        .unwrap();

    assert_eq!(summary.created_count, 0);
    assert_eq!(summary.errors, vec![RowError::new(3, "Invalid amount value")]);
}
