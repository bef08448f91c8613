// ==========================================
// 薪资导入对账系统 - 引用号序列仓储
// ==========================================
// 职责: 管理 ir_sequence 表，按代码发放补零序号
// 说明: 取号与自增在同一写事务内完成
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{connection_error, RepositoryError, RepositoryResult};
use crate::repository::payroll_store::ReferenceSequence;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::{Arc, Mutex};

pub struct SequenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SequenceRepository {
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
            CREATE TABLE IF NOT EXISTS ir_sequence (
              code TEXT PRIMARY KEY,
              next_number INTEGER NOT NULL DEFAULT 1 CHECK (next_number >= 0),
              padding INTEGER NOT NULL DEFAULT 3 CHECK (padding >= 0)
            );
            "#,
        )?;
        Ok(())
    }

    /// 定义（或重置）序列
    pub fn define(&self, code: &str, next_number: i64, padding: u32) -> RepositoryResult<()> {
        if next_number < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "ir_sequence.next_number".to_string(),
                message: format!("must be >= 0, got {}", next_number),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO ir_sequence (code, next_number, padding)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(code) DO UPDATE SET
              next_number = excluded.next_number,
              padding = excluded.padding
            "#,
            params![code, next_number, padding],
        )?;
        Ok(())
    }
}

impl ReferenceSequence for SequenceRepository {
    fn next_by_code(&self, code: &str) -> RepositoryResult<Option<String>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(i64, u32)> = tx
            .query_row(
                "SELECT next_number, padding FROM ir_sequence WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((number, padding)) = current else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE ir_sequence SET next_number = next_number + 1 WHERE code = ?1",
            params![code],
        )?;
        tx.commit()?;

        Ok(Some(format!(
            "{:0width$}",
            number,
            width = padding as usize
        )))
    }
}
