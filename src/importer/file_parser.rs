// ==========================================
// 薪资导入对账系统 - 表格读取器
// ==========================================
// 职责: 上传内容（字节 + 文件名）→ 按行的单元格序列
// 支持: Excel (.xlsx/.xlsm/.xls) / ODS (.ods) / CSV (.csv)
// 说明:
// - 只读第一个工作表
// - 行号为表格自身行号（1 起，含表头）
// - 完全空白的行不返回
// ==========================================

use crate::domain::ImportUpload;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{Data, Ods, Reader, Xls, Xlsx};
use csv::ReaderBuilder;
use std::fmt;
use std::io::{Cursor, Read, Seek};

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// 文本单元格统一去除首尾空白，空串视为空单元格
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 作为代码/名称使用时的文本形式（整数值的浮点数按整数渲染）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
                Some(format!("{}", *f as i64))
            }
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::text(s),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

// ==========================================
// SheetRow - 表格中的一行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub row_number: usize,
    pub cells: Vec<CellValue>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl SheetRow {
    /// 越界的列视为空单元格
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

// ==========================================
// SpreadsheetFormat - 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Xls,
    Ods,
    Csv,
}

impl fmt::Display for SpreadsheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpreadsheetFormat::Xlsx => "xlsx",
            SpreadsheetFormat::Xls => "xls",
            SpreadsheetFormat::Ods => "ods",
            SpreadsheetFormat::Csv => "csv",
        };
        write!(f, "{}", s)
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

impl SpreadsheetFormat {
    /// 按扩展名判断格式；无扩展名时按文件头判断
    pub fn detect(file_name: &str, content: &[u8]) -> ImportResult<Self> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(SpreadsheetFormat::Xlsx),
            "xls" => Ok(SpreadsheetFormat::Xls),
            "ods" => Ok(SpreadsheetFormat::Ods),
            "csv" => Ok(SpreadsheetFormat::Csv),
            "" if content.starts_with(ZIP_MAGIC) => Ok(SpreadsheetFormat::Xlsx),
            "" if content.starts_with(OLE_MAGIC) => Ok(SpreadsheetFormat::Xls),
            "" => Err(ImportError::UnsupportedFormat(file_name.to_string())),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ==========================================
// SheetReader Trait
// ==========================================
pub trait SheetReader {
    /// 读取第一个工作表的所有非空行
    fn read_rows(&self, content: &[u8]) -> ImportResult<Vec<SheetRow>>;
}

// ==========================================
// CSV Reader 实现
// ==========================================
pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read_rows(&self, content: &[u8]) -> ImportResult<Vec<SheetRow>> {
        // 去除 UTF-8 BOM
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(content);

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // csv 会跳过空行、引号内可跨行，行号取记录起始行
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);
            let row = SheetRow {
                row_number,
                cells: record.iter().map(CellValue::text).collect(),
            };

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

// ==========================================
// Workbook Reader 实现（calamine）
// ==========================================
pub struct WorkbookSheetReader {
    format: SpreadsheetFormat,
}

impl WorkbookSheetReader {
    pub fn new(format: SpreadsheetFormat) -> Self {
        Self { format }
    }
}

impl SheetReader for WorkbookSheetReader {
    fn read_rows(&self, content: &[u8]) -> ImportResult<Vec<SheetRow>> {
        let cursor = Cursor::new(content.to_vec());
        match self.format {
            SpreadsheetFormat::Xlsx => first_sheet_rows(Xlsx::new(cursor).map_err(excel_err)?),
            SpreadsheetFormat::Xls => first_sheet_rows(Xls::new(cursor).map_err(excel_err)?),
            SpreadsheetFormat::Ods => first_sheet_rows(Ods::new(cursor).map_err(excel_err)?),
            SpreadsheetFormat::Csv => CsvSheetReader.read_rows(content),
        }
    }
}

fn excel_err<E: fmt::Display>(err: E) -> ImportError {
    ImportError::ExcelParseError(err.to_string())
}

fn first_sheet_rows<RS, R>(mut workbook: R) -> ImportResult<Vec<SheetRow>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    // 读取第一个 sheet
    let sheet_names = workbook.sheet_names();
    let sheet_name = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| ImportError::ExcelParseError("workbook has no worksheet".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(excel_err)?;

    // Range 可能不从 A1 开始，行号/列号需按起点偏移
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let mut rows = Vec::new();
    for (idx, data_row) in range.rows().enumerate() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(data_row.iter().map(CellValue::from));

        let row = SheetRow {
            row_number: start_row as usize + idx + 1,
            cells,
        };

        // 跳过完全空白的行
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(rows)
}

// ==========================================
// 通用读取入口（根据文件名/文件头自动选择）
// ==========================================
pub fn read_upload(upload: &ImportUpload) -> ImportResult<Vec<SheetRow>> {
    if upload.is_empty() {
        return Err(ImportError::EmptyPayload);
    }

    let format = SpreadsheetFormat::detect(&upload.file_name, &upload.content)?;
    tracing::debug!(file_name = %upload.file_name, format = %format, "识别上传文件格式");

    match format {
        SpreadsheetFormat::Csv => CsvSheetReader.read_rows(&upload.content),
        other => WorkbookSheetReader::new(other).read_rows(&upload.content),
    }
}
