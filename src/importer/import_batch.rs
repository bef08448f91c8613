// ==========================================
// 薪资导入对账系统 - 导入批次
// ==========================================
// 职责: 驱动 读取 → 行解析 → 实体解析 → 落库，汇总结果
// 流程:
//   1. 确定目标导入表（已有 / 新建）
//   2. 读取第一个工作表，跳过表头行
//   3. 逐行解析，行级错误累积后继续
//   4. 成功明细一次性写入；附件导入时清空附件
//   5. 本次新建的导入表在逐行处理失败时删除
// 红线: 致命错误（无文件/格式不支持/文件损坏）发生在任何行处理之前
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{
    format_reference, ImportLine, ImportSheet, ImportSummary, ImportUpload, NewSheet, RowError,
    RowWarning, SheetState, SheetTarget, FALLBACK_SEQUENCE,
};
use crate::importer::entity_resolver::{EntityResolver, Resolution};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{read_upload, SheetRow};
use crate::importer::row_parser::RowParser;
use crate::repository::{ImportSheetStore, ReferenceSequence};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ImportBatch {
    sheets: Arc<dyn ImportSheetStore>,
    sequences: Arc<dyn ReferenceSequence>,
    config: Arc<dyn ImportConfigReader>,
    parser: RowParser,
    resolver: EntityResolver,
}

impl ImportBatch {
    pub fn new(
        sheets: Arc<dyn ImportSheetStore>,
        sequences: Arc<dyn ReferenceSequence>,
        config: Arc<dyn ImportConfigReader>,
        resolver: EntityResolver,
    ) -> Self {
        Self {
            sheets,
            sequences,
            config,
            parser: RowParser::new(),
            resolver,
        }
    }

    /// 新建导入表（draft）
    ///
    /// 未给出显式名称时按序列生成 `<seq>/<MM>/<YYYY>`，序列缺失时用 001
    pub fn create_sheet(&self, new_sheet: &NewSheet) -> ImportResult<ImportSheet> {
        validate_period(new_sheet.month, new_sheet.year)?;

        let explicit = new_sheet
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let name = match explicit {
            Some(n) => n.to_string(),
            None => {
                let code = self.config.get_reference_sequence_code()?;
                let seq = match self.sequences.next_by_code(&code)? {
                    Some(seq) => seq,
                    None => {
                        warn!(sequence_code = %code, "引用号序列未定义，使用兜底序号");
                        FALLBACK_SEQUENCE.to_string()
                    }
                };
                format_reference(&seq, new_sheet.month, new_sheet.year)
            }
        };

        let sheet = self
            .sheets
            .create_sheet(&name, new_sheet.month, new_sheet.year)?;
        info!(sheet_id = %sheet.sheet_id, sheet_name = %sheet.name, "导入表已创建");
        Ok(sheet)
    }

    /// 导入导入表上已附加的文件（导入后清空附件）
    pub fn import_attached(&self, sheet_id: &str) -> ImportResult<ImportSummary> {
        let upload = match self.sheets.load_file(sheet_id)? {
            Some(upload) if !upload.is_empty() => upload,
            _ => return Err(ImportError::NoFileChosen),
        };
        self.execute(&SheetTarget::Existing(sheet_id.to_string()), &upload, true)
    }

    /// 执行导入（直接上传，不影响导入表上已附加的文件）
    ///
    /// # 返回
    /// - Ok(ImportSummary): 成功明细数 + 行级错误（按行号升序）
    /// - Err: 致命错误，未写入任何明细
    pub fn run(&self, target: &SheetTarget, upload: &ImportUpload) -> ImportResult<ImportSummary> {
        self.execute(target, upload, false)
    }

    #[instrument(skip(self, target, upload), fields(file_name = %upload.file_name))]
    fn execute(
        &self,
        target: &SheetTarget,
        upload: &ImportUpload,
        from_attachment: bool,
    ) -> ImportResult<ImportSummary> {
        // 1. 已有导入表先行校验
        let existing = match target {
            SheetTarget::Existing(sheet_id) => Some(
                self.sheets
                    .get_sheet(sheet_id)?
                    .ok_or_else(|| ImportError::SheetNotFound(sheet_id.clone()))?,
            ),
            SheetTarget::New(new_sheet) => {
                validate_period(new_sheet.month, new_sheet.year)?;
                None
            }
        };

        // 2. 读取文件（致命错误在此抛出）
        let rows = read_upload(upload)?;
        let header_rows = self.config.get_header_rows()?;
        info!(total_rows = rows.len(), header_rows, "文件解析完成");

        // 3. 确定目标导入表
        let (sheet, created) = match (existing, target) {
            (Some(sheet), _) => (sheet, false),
            (None, SheetTarget::New(new_sheet)) => (self.create_sheet(new_sheet)?, true),
            (None, SheetTarget::Existing(sheet_id)) => {
                return Err(ImportError::SheetNotFound(sheet_id.clone()))
            }
        };
        if sheet.state == SheetState::Done {
            warn!(sheet_id = %sheet.sheet_id, "向已完成对账的导入表追加明细");
        }

        // 4. 逐行处理 + 落库；本次新建的导入表在失败时撤销
        let outcome = self.import_rows(&sheet.sheet_id, &rows, header_rows);
        let (created_count, errors, warnings) = match outcome {
            Ok(result) => result,
            Err(e) => {
                if created {
                    if let Err(cleanup) = self.sheets.delete_sheet(&sheet.sheet_id) {
                        warn!(sheet_id = %sheet.sheet_id, error = %cleanup, "撤销新建导入表失败");
                    }
                }
                return Err(e);
            }
        };

        // 5. 附件导入完成后清空附件
        if from_attachment {
            self.sheets.clear_file(&sheet.sheet_id)?;
        }

        info!(
            sheet_id = %sheet.sheet_id,
            created = created_count,
            errors = errors.len(),
            warnings = warnings.len(),
            "导入完成"
        );

        Ok(ImportSummary {
            sheet_id: sheet.sheet_id,
            sheet_name: sheet.name,
            created_count,
            errors,
            warnings,
        })
    }

    fn import_rows(
        &self,
        sheet_id: &str,
        rows: &[SheetRow],
        header_rows: usize,
    ) -> ImportResult<(usize, Vec<RowError>, Vec<RowWarning>)> {
        let mut lines: Vec<ImportLine> = Vec::new();
        let mut errors: Vec<RowError> = Vec::new();
        let mut warnings: Vec<RowWarning> = Vec::new();

        for row in rows.iter().filter(|r| r.row_number > header_rows) {
            let parsed = match self.parser.parse(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(row_number = row.row_number, error = %e.message, "行解析失败");
                    errors.push(e);
                    continue;
                }
            };

            match self.resolver.resolve(sheet_id, &parsed)? {
                Resolution::Line { line, warning } => {
                    if let Some(w) = warning {
                        warnings.push(w);
                    }
                    lines.push(line);
                }
                Resolution::Rejected(e) => {
                    debug!(row_number = row.row_number, error = %e.message, "行解析失败");
                    errors.push(e);
                }
            }
        }

        let created_count = self.sheets.insert_lines(sheet_id, &lines)?;
        Ok((created_count, errors, warnings))
    }
}

/// 导入表期间校验: 月份 1–12，年份为正
pub fn validate_period(month: u32, year: i32) -> ImportResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ImportError::InvalidSheetHeader(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }
    if year <= 0 {
        return Err(ImportError::InvalidSheetHeader(format!(
            "year must be positive, got {}",
            year
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::open_in_memory_connection;
    use crate::domain::{Employee, NameMatch};
    use crate::repository::{
        EmployeeDirectory, EmployeeRepository, ImportSheetRepository, InputTypeRepository,
        RepositoryError, RepositoryResult, SequenceRepository,
    };

    /// 查找时总是失败的员工目录
    struct BrokenDirectory;

    impl EmployeeDirectory for BrokenDirectory {
        fn find_by_code(&self, _code: &str) -> RepositoryResult<Option<Employee>> {
            Err(RepositoryError::LockError("poisoned".to_string()))
        }

        fn find_by_name(&self, _name: &str) -> RepositoryResult<NameMatch> {
            Err(RepositoryError::LockError("poisoned".to_string()))
        }

        fn get_employee(&self, _employee_id: i64) -> RepositoryResult<Option<Employee>> {
            Ok(None)
        }
    }

    struct Fixture {
        batch: ImportBatch,
        sheets: Arc<ImportSheetRepository>,
        sequences: Arc<SequenceRepository>,
    }

    fn fixture() -> Fixture {
        let conn = open_in_memory_connection().unwrap();
        let employees = Arc::new(EmployeeRepository::from_connection(conn.clone()).unwrap());
        let input_types = Arc::new(InputTypeRepository::from_connection(conn.clone()).unwrap());
        let sheets = Arc::new(ImportSheetRepository::from_connection(conn.clone()).unwrap());
        let sequences = Arc::new(SequenceRepository::from_connection(conn.clone()).unwrap());
        let config = Arc::new(ConfigManager::from_connection(conn).unwrap());

        employees.insert(Some("E001"), "Alice Perera").unwrap();
        input_types.insert("TRN", "Transport Allowance").unwrap();

        let resolver = EntityResolver::new(employees, input_types);
        let batch = ImportBatch::new(sheets.clone(), sequences.clone(), config, resolver);
        Fixture {
            batch,
            sheets,
            sequences,
        }
    }

    #[test]
    fn test_create_sheet_uses_sequence_or_fallback() {
        let f = fixture();
        let new_sheet = NewSheet {
            name: None,
            month: 3,
            year: 2025,
        };

        let sheet = f.batch.create_sheet(&new_sheet).unwrap();
        assert_eq!(sheet.name, "001/03/2025");

        f.sequences.define("payroll.import", 7, 3).unwrap();
        let sheet = f.batch.create_sheet(&new_sheet).unwrap();
        assert_eq!(sheet.name, "007/03/2025");
        assert_eq!(sheet.state, SheetState::Draft);
    }

    #[test]
    fn test_create_sheet_validates_period() {
        let f = fixture();
        let err = f
            .batch
            .create_sheet(&NewSheet {
                name: Some("X".to_string()),
                month: 0,
                year: 2025,
            })
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidSheetHeader(_)));
    }

    #[test]
    fn test_import_attached_without_file() {
        let f = fixture();
        let sheet = f.sheets.create_sheet("S", 3, 2025).unwrap();
        let err = f.batch.import_attached(&sheet.sheet_id).unwrap_err();
        assert_eq!(err.to_string(), "Please choose an Excel file first.");
    }

    #[test]
    fn test_run_skips_header_and_clears_attachment() {
        let f = fixture();
        let sheet = f.sheets.create_sheet("S", 3, 2025).unwrap();
        let upload = ImportUpload::new(
            "march.csv",
            b"Employee Code,Employee Name,Input Type,Amount,Notes\nE001,,TRN,12.5,\n".to_vec(),
        );
        f.sheets.attach_file(&sheet.sheet_id, &upload).unwrap();

        let summary = f.batch.import_attached(&sheet.sheet_id).unwrap();
        assert_eq!(summary.created_count, 1);
        assert!(summary.errors.is_empty());
        assert!(f.sheets.load_file(&sheet.sheet_id).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_format_creates_nothing() {
        let f = fixture();
        let upload = ImportUpload::new("march.pdf", b"%PDF-1.4".to_vec());
        let err = f
            .batch
            .run(
                &SheetTarget::New(NewSheet {
                    name: None,
                    month: 3,
                    year: 2025,
                }),
                &upload,
            )
            .unwrap_err();

        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
        assert!(f.sheets.list_sheets(3, 2025).unwrap().is_empty());
    }

    #[test]
    fn test_direct_import_keeps_unrelated_attachment() {
        let f = fixture();
        let sheet = f.sheets.create_sheet("S", 3, 2025).unwrap();
        let attached = ImportUpload::new("attached.csv", b"header\nE001,,TRN,1,\n".to_vec());
        f.sheets.attach_file(&sheet.sheet_id, &attached).unwrap();

        let direct = ImportUpload::new("direct.csv", b"header\nE001,,TRN,2,\n".to_vec());
        let summary = f
            .batch
            .run(&SheetTarget::Existing(sheet.sheet_id.clone()), &direct)
            .unwrap();
        assert_eq!(summary.created_count, 1);

        let kept = f.sheets.load_file(&sheet.sheet_id).unwrap().unwrap();
        assert_eq!(kept.file_name, "attached.csv");
    }

    #[test]
    fn test_lookup_failure_removes_new_sheet() {
        let conn = open_in_memory_connection().unwrap();
        let input_types = Arc::new(InputTypeRepository::from_connection(conn.clone()).unwrap());
        let sheets = Arc::new(ImportSheetRepository::from_connection(conn.clone()).unwrap());
        let sequences = Arc::new(SequenceRepository::from_connection(conn.clone()).unwrap());
        let config = Arc::new(ConfigManager::from_connection(conn).unwrap());
        input_types.insert("TRN", "Transport Allowance").unwrap();

        let resolver = EntityResolver::new(Arc::new(BrokenDirectory), input_types);
        let batch = ImportBatch::new(sheets.clone(), sequences, config, resolver);

        let upload = ImportUpload::new("march.csv", b"header\nE001,,TRN,1,\n".to_vec());
        let err = batch
            .run(
                &SheetTarget::New(NewSheet {
                    name: None,
                    month: 3,
                    year: 2025,
                }),
                &upload,
            )
            .unwrap_err();

        assert!(matches!(err, ImportError::Repository(RepositoryError::LockError(_))));
        assert!(sheets.list_sheets(3, 2025).unwrap().is_empty());
    }
}
