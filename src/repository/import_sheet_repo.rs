// ==========================================
// 薪资导入对账系统 - 导入表仓储
// ==========================================
// 职责: 管理 payroll_import_sheet / payroll_import_line 表
// 说明:
// - 明细按 seq_no 保序（即源表行顺序），重复导入到同一张表时追加
// - 删除导入表时明细级联删除
// - applied 只会被置为 1，不会回退
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{
    ImportLine, ImportSheet, ImportUpload, ReconcileOutcome, SheetState,
};
use crate::repository::error::{connection_error, field_error, RepositoryError, RepositoryResult};
use crate::repository::payroll_store::ImportSheetStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct ImportSheetRepository {
    conn: Arc<Mutex<Connection>>,
}

const SHEET_COLUMNS: &str = r#"
    sheet_id, name, month, year, state, outcome, import_filename,
    import_file IS NOT NULL AND length(import_file) > 0, created_at, updated_at
"#;

struct SheetRow {
    sheet_id: String,
    name: String,
    month: u32,
    year: i32,
    state: String,
    outcome: Option<String>,
    import_filename: Option<String>,
    has_file: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SheetRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sheet_id: row.get(0)?,
            name: row.get(1)?,
            month: row.get(2)?,
            year: row.get(3)?,
            state: row.get(4)?,
            outcome: row.get(5)?,
            import_filename: row.get(6)?,
            has_file: row.get::<_, i64>(7)? != 0,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_domain(self) -> RepositoryResult<ImportSheet> {
        let state = SheetState::from_str(&self.state)
            .map_err(|e| field_error("payroll_import_sheet.state", e))?;
        let outcome = self
            .outcome
            .as_deref()
            .map(ReconcileOutcome::from_str)
            .transpose()
            .map_err(|e| field_error("payroll_import_sheet.outcome", e))?;

        Ok(ImportSheet {
            sheet_id: self.sheet_id,
            name: self.name,
            month: self.month,
            year: self.year,
            state,
            outcome,
            import_filename: self.import_filename,
            has_file: self.has_file,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

struct LineRow {
    line_id: String,
    sheet_id: String,
    source_row: i64,
    employee_id: i64,
    input_type_id: i64,
    amount: String,
    description: String,
    applied: bool,
}

impl LineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            line_id: row.get(0)?,
            sheet_id: row.get(1)?,
            source_row: row.get(2)?,
            employee_id: row.get(3)?,
            input_type_id: row.get(4)?,
            amount: row.get(5)?,
            description: row.get(6)?,
            applied: row.get::<_, i64>(7)? != 0,
        })
    }

    fn into_domain(self) -> RepositoryResult<ImportLine> {
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| field_error("payroll_import_line.amount", e.to_string()))?;
        Ok(ImportLine {
            line_id: self.line_id,
            sheet_id: self.sheet_id,
            source_row: self.source_row as usize,
            employee_id: self.employee_id,
            input_type_id: self.input_type_id,
            amount,
            description: self.description,
            applied: self.applied,
        })
    }
}

impl ImportSheetRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(connection_error)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS payroll_import_sheet (
              sheet_id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
              year INTEGER NOT NULL,
              state TEXT NOT NULL DEFAULT 'draft',
              outcome TEXT,
              import_filename TEXT,
              import_file BLOB,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_payroll_import_sheet_period
              ON payroll_import_sheet(year, month);

            CREATE TABLE IF NOT EXISTS payroll_import_line (
              line_id TEXT PRIMARY KEY,
              sheet_id TEXT NOT NULL REFERENCES payroll_import_sheet(sheet_id) ON DELETE CASCADE,
              seq_no INTEGER NOT NULL,
              source_row INTEGER NOT NULL,
              employee_id INTEGER NOT NULL,
              input_type_id INTEGER NOT NULL,
              amount TEXT NOT NULL,
              description TEXT NOT NULL DEFAULT '',
              applied INTEGER NOT NULL DEFAULT 0,
              UNIQUE (sheet_id, seq_no)
            );
            "#,
        )?;
        Ok(())
    }

    fn read_state(conn: &Connection, sheet_id: &str) -> RepositoryResult<SheetState> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM payroll_import_sheet WHERE sheet_id = ?1",
                params![sheet_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => SheetState::from_str(&s)
                .map_err(|e| field_error("payroll_import_sheet.state", e)),
            None => Err(RepositoryError::NotFound {
                entity: "ImportSheet".to_string(),
                id: sheet_id.to_string(),
            }),
        }
    }

    fn ensure_updated(changed: usize, sheet_id: &str) -> RepositoryResult<()> {
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportSheet".to_string(),
                id: sheet_id.to_string(),
            });
        }
        Ok(())
    }
}

impl ImportSheetStore for ImportSheetRepository {
    fn create_sheet(&self, name: &str, month: u32, year: i32) -> RepositoryResult<ImportSheet> {
        let now = Utc::now();
        let sheet = ImportSheet {
            sheet_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            month,
            year,
            state: SheetState::Draft,
            outcome: None,
            import_filename: None,
            has_file: false,
            created_at: now,
            updated_at: now,
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO payroll_import_sheet (
                sheet_id, name, month, year, state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                sheet.sheet_id,
                sheet.name,
                sheet.month,
                sheet.year,
                sheet.state.as_str(),
                sheet.created_at,
                sheet.updated_at,
            ],
        )?;
        Ok(sheet)
    }

    fn get_sheet(&self, sheet_id: &str) -> RepositoryResult<Option<ImportSheet>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM payroll_import_sheet WHERE sheet_id = ?1",
            SHEET_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![sheet_id], SheetRow::from_row)
            .optional()?;
        raw.map(SheetRow::into_domain).transpose()
    }

    fn list_sheets(&self, month: u32, year: i32) -> RepositoryResult<Vec<ImportSheet>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM payroll_import_sheet WHERE month = ?1 AND year = ?2 ORDER BY created_at, name",
            SHEET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![month, year], SheetRow::from_row)?;

        let mut sheets = Vec::new();
        for row in rows {
            sheets.push(row?.into_domain()?);
        }
        Ok(sheets)
    }

    fn list_lines(&self, sheet_id: &str) -> RepositoryResult<Vec<ImportLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT line_id, sheet_id, source_row, employee_id, input_type_id,
                   amount, description, applied
            FROM payroll_import_line
            WHERE sheet_id = ?1
            ORDER BY seq_no
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id], LineRow::from_row)?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?.into_domain()?);
        }
        Ok(lines)
    }

    fn insert_lines(&self, sheet_id: &str, lines: &[ImportLine]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq_no), 0) FROM payroll_import_line WHERE sheet_id = ?1",
            params![sheet_id],
            |row| row.get(0),
        )?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO payroll_import_line (
                    line_id, sheet_id, seq_no, source_row, employee_id,
                    input_type_id, amount, description, applied
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;

            for line in lines {
                next_seq += 1;
                stmt.execute(params![
                    line.line_id,
                    sheet_id,
                    next_seq,
                    line.source_row as i64,
                    line.employee_id,
                    line.input_type_id,
                    line.amount.to_string(),
                    line.description,
                    line.applied as i32,
                ])?;
                count += 1;
            }
        }

        tx.execute(
            "UPDATE payroll_import_sheet SET updated_at = ?1 WHERE sheet_id = ?2",
            params![Utc::now(), sheet_id],
        )?;
        tx.commit()?;
        Ok(count)
    }

    fn mark_line_applied(&self, line_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE payroll_import_line SET applied = 1 WHERE line_id = ?1",
            params![line_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportLine".to_string(),
                id: line_id.to_string(),
            });
        }
        Ok(())
    }

    fn finish_sheet(&self, sheet_id: &str, outcome: ReconcileOutcome) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let current = Self::read_state(&conn, sheet_id)?;
        if !current.can_transition_to(SheetState::Done) {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.to_string(),
                to: SheetState::Done.to_string(),
            });
        }

        conn.execute(
            r#"
            UPDATE payroll_import_sheet
            SET state = ?1, outcome = ?2, updated_at = ?3
            WHERE sheet_id = ?4
            "#,
            params![
                SheetState::Done.as_str(),
                outcome.as_str(),
                Utc::now(),
                sheet_id
            ],
        )?;
        Ok(())
    }

    fn attach_file(&self, sheet_id: &str, upload: &ImportUpload) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE payroll_import_sheet
            SET import_filename = ?1, import_file = ?2, updated_at = ?3
            WHERE sheet_id = ?4
            "#,
            params![upload.file_name, upload.content, Utc::now(), sheet_id],
        )?;
        Self::ensure_updated(changed, sheet_id)
    }

    fn load_file(&self, sheet_id: &str) -> RepositoryResult<Option<ImportUpload>> {
        let conn = self.get_conn()?;
        let raw: Option<(Option<String>, Option<Vec<u8>>)> = conn
            .query_row(
                "SELECT import_filename, import_file FROM payroll_import_sheet WHERE sheet_id = ?1",
                params![sheet_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match raw {
            None => Err(RepositoryError::NotFound {
                entity: "ImportSheet".to_string(),
                id: sheet_id.to_string(),
            }),
            Some((_, None)) => Ok(None),
            Some((file_name, Some(content))) => Ok(Some(ImportUpload::new(
                file_name.unwrap_or_default(),
                content,
            ))),
        }
    }

    fn clear_file(&self, sheet_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE payroll_import_sheet
            SET import_file = NULL, updated_at = ?1
            WHERE sheet_id = ?2
            "#,
            params![Utc::now(), sheet_id],
        )?;
        Self::ensure_updated(changed, sheet_id)
    }

    fn delete_sheet(&self, sheet_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "DELETE FROM payroll_import_sheet WHERE sheet_id = ?1",
            params![sheet_id],
        )?;
        Self::ensure_updated(changed, sheet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;
    use rust_decimal_macros::dec;

    fn setup() -> ImportSheetRepository {
        ImportSheetRepository::from_connection(open_in_memory_connection().unwrap()).unwrap()
    }

    fn line(sheet_id: &str, row: usize, amount: Decimal) -> ImportLine {
        ImportLine {
            line_id: Uuid::new_v4().to_string(),
            sheet_id: sheet_id.to_string(),
            source_row: row,
            employee_id: 1,
            input_type_id: 1,
            amount,
            description: "Transport Allowance".to_string(),
            applied: false,
        }
    }

    #[test]
    fn test_lines_keep_insertion_order_across_imports() {
        let repo = setup();
        let sheet = repo.create_sheet("001/03/2025", 3, 2025).unwrap();

        repo.insert_lines(
            &sheet.sheet_id,
            &[line(&sheet.sheet_id, 2, dec!(10)), line(&sheet.sheet_id, 3, dec!(20))],
        )
        .unwrap();
        repo.insert_lines(&sheet.sheet_id, &[line(&sheet.sheet_id, 2, dec!(30))])
            .unwrap();

        let amounts: Vec<Decimal> = repo
            .list_lines(&sheet.sheet_id)
            .unwrap()
            .into_iter()
            .map(|l| l.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(10), dec!(20), dec!(30)]);
    }

    #[test]
    fn test_invalid_month_rejected_by_schema() {
        let repo = setup();
        assert!(repo.create_sheet("x", 13, 2025).is_err());
    }

    #[test]
    fn test_finish_sheet_is_one_way() {
        let repo = setup();
        let sheet = repo.create_sheet("001/03/2025", 3, 2025).unwrap();

        repo.finish_sheet(&sheet.sheet_id, ReconcileOutcome::DoneWithSkips)
            .unwrap();
        let reloaded = repo.get_sheet(&sheet.sheet_id).unwrap().unwrap();
        assert_eq!(reloaded.state, SheetState::Done);
        assert_eq!(reloaded.outcome, Some(ReconcileOutcome::DoneWithSkips));

        // 重复对账仍为 done
        repo.finish_sheet(&sheet.sheet_id, ReconcileOutcome::Done).unwrap();
        let reloaded = repo.get_sheet(&sheet.sheet_id).unwrap().unwrap();
        assert_eq!(reloaded.state, SheetState::Done);
        assert_eq!(reloaded.outcome, Some(ReconcileOutcome::Done));
    }

    #[test]
    fn test_attach_load_clear_file() {
        let repo = setup();
        let sheet = repo.create_sheet("001/03/2025", 3, 2025).unwrap();
        assert!(repo.load_file(&sheet.sheet_id).unwrap().is_none());

        repo.attach_file(&sheet.sheet_id, &ImportUpload::new("march.csv", b"a,b\n".to_vec()))
            .unwrap();
        assert!(repo.get_sheet(&sheet.sheet_id).unwrap().unwrap().has_file);
        let upload = repo.load_file(&sheet.sheet_id).unwrap().unwrap();
        assert_eq!(upload.file_name, "march.csv");

        repo.clear_file(&sheet.sheet_id).unwrap();
        assert!(repo.load_file(&sheet.sheet_id).unwrap().is_none());
        let reloaded = repo.get_sheet(&sheet.sheet_id).unwrap().unwrap();
        assert!(!reloaded.has_file);
        // 文件名保留，仅清空内容
        assert_eq!(reloaded.import_filename.as_deref(), Some("march.csv"));
    }

    #[test]
    fn test_delete_sheet_cascades_lines() {
        let repo = setup();
        let sheet = repo.create_sheet("001/03/2025", 3, 2025).unwrap();
        repo.insert_lines(&sheet.sheet_id, &[line(&sheet.sheet_id, 2, dec!(1))])
            .unwrap();

        repo.delete_sheet(&sheet.sheet_id).unwrap();
        assert!(repo.list_lines(&sheet.sheet_id).unwrap().is_empty());
        assert!(repo.get_sheet(&sheet.sheet_id).unwrap().is_none());
    }

    #[test]
    fn test_mark_line_applied_unknown_line() {
        let repo = setup();
        let err = repo.mark_line_applied("missing").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
