// ==========================================
// 薪资导入对账系统 - 导入对账 API
// ==========================================
// 职责: 组装仓储/导入器/对账引擎，提供调用方入口
// 入口:
// - 附件导入: attach_file → import_attached（导入后清空附件）
// - 直接导入: import_file（可指定已有导入表或新建）
// - 对账: apply_to_payslips
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::open_shared_connection;
use crate::domain::{
    ApplySummary, ImportLine, ImportSheet, ImportSummary, ImportUpload, NewSheet, SheetTarget,
};
use crate::engine::PayslipReconciler;
use crate::importer::{validate_period, EntityResolver, ImportBatch, ImportError};
use crate::repository::{
    EmployeeRepository, ImportSheetRepository, ImportSheetStore, InputTypeRepository,
    PayslipRepository, SequenceRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 导入对账 API
pub struct PayrollImportApi {
    sheets: Arc<ImportSheetRepository>,
    sequences: Arc<SequenceRepository>,
    importer: ImportBatch,
    reconciler: PayslipReconciler,
}

impl PayrollImportApi {
    /// 打开数据库文件并初始化全部仓储
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_shared_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// 基于共享连接初始化（所有仓储共用同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let employees = Arc::new(EmployeeRepository::from_connection(conn.clone())?);
        let input_types = Arc::new(InputTypeRepository::from_connection(conn.clone())?);
        let payslips = Arc::new(PayslipRepository::from_connection(conn.clone())?);
        let sheets = Arc::new(ImportSheetRepository::from_connection(conn.clone())?);
        let sequences = Arc::new(SequenceRepository::from_connection(conn.clone())?);
        let config = Arc::new(ConfigManager::from_connection(conn)?);

        let resolver = EntityResolver::new(employees.clone(), input_types);
        let importer = ImportBatch::new(
            sheets.clone(),
            sequences.clone(),
            config.clone(),
            resolver,
        );
        let reconciler = PayslipReconciler::new(sheets.clone(), payslips, employees, config);

        Ok(Self {
            sheets,
            sequences,
            importer,
            reconciler,
        })
    }

    // ==========================================
    // 导入表
    // ==========================================

    /// 新建导入表（未给名称时按序列生成引用号）
    pub fn create_sheet(&self, new_sheet: &NewSheet) -> ApiResult<ImportSheet> {
        Ok(self.importer.create_sheet(new_sheet)?)
    }

    pub fn get_sheet(&self, sheet_id: &str) -> ApiResult<ImportSheet> {
        self.sheets
            .get_sheet(sheet_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ImportSheet(id={})不存在", sheet_id)))
    }

    pub fn list_lines(&self, sheet_id: &str) -> ApiResult<Vec<ImportLine>> {
        self.get_sheet(sheet_id)?;
        Ok(self.sheets.list_lines(sheet_id)?)
    }

    pub fn list_sheets(&self, month: u32, year: i32) -> ApiResult<Vec<ImportSheet>> {
        validate_period(month, year)?;
        Ok(self.sheets.list_sheets(month, year)?)
    }

    /// 删除导入表（明细级联删除）
    pub fn delete_sheet(&self, sheet_id: &str) -> ApiResult<()> {
        self.sheets.delete_sheet(sheet_id)?;
        info!(sheet_id = %sheet_id, "导入表已删除");
        Ok(())
    }

    // ==========================================
    // 附件
    // ==========================================

    pub fn attach_file(&self, sheet_id: &str, upload: &ImportUpload) -> ApiResult<()> {
        if upload.is_empty() {
            return Err(ImportError::EmptyPayload.into());
        }
        self.sheets.attach_file(sheet_id, upload)?;
        info!(sheet_id = %sheet_id, file_name = %upload.file_name, bytes = upload.content.len(), "附件已上传");
        Ok(())
    }

    pub fn attach_file_base64(
        &self,
        sheet_id: &str,
        file_name: &str,
        encoded: &str,
    ) -> ApiResult<()> {
        let upload = ImportUpload::from_base64(file_name, encoded).map_err(ImportError::from)?;
        self.attach_file(sheet_id, &upload)
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 导入导入表上已附加的文件
    #[instrument(skip(self))]
    pub fn import_attached(&self, sheet_id: &str) -> ApiResult<ImportSummary> {
        Ok(self.importer.import_attached(sheet_id)?)
    }

    /// 直接导入（目标为已有导入表或新建）
    pub fn import_file(
        &self,
        target: &SheetTarget,
        upload: &ImportUpload,
    ) -> ApiResult<ImportSummary> {
        Ok(self.importer.run(target, upload)?)
    }

    pub fn import_file_base64(
        &self,
        target: &SheetTarget,
        file_name: &str,
        encoded: &str,
    ) -> ApiResult<ImportSummary> {
        let upload = ImportUpload::from_base64(file_name, encoded).map_err(ImportError::from)?;
        self.import_file(target, &upload)
    }

    // ==========================================
    // 对账
    // ==========================================

    #[instrument(skip(self))]
    pub fn apply_to_payslips(&self, sheet_id: &str) -> ApiResult<ApplySummary> {
        Ok(self.reconciler.apply(sheet_id)?)
    }

    // ==========================================
    // 序列
    // ==========================================

    /// 定义引用号序列（起始号 + 补零位数）
    pub fn define_sequence(&self, code: &str, next_number: i64, padding: u32) -> ApiResult<()> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("sequence code is required".to_string()));
        }
        self.sequences.define(code.trim(), next_number, padding)?;
        Ok(())
    }
}
