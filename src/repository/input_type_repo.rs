// ==========================================
// 薪资导入对账系统 - 工资单输入类型目录
// ==========================================
// 职责: 管理 hr_payslip_input_type 表
// 红线: 导入流程只读，未知代码从不自动创建
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::InputType;
use crate::repository::error::{connection_error, RepositoryError, RepositoryResult};
use crate::repository::payroll_store::InputTypeCatalog;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct InputTypeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InputTypeRepository {
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
            CREATE TABLE IF NOT EXISTS hr_payslip_input_type (
              input_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
              code TEXT NOT NULL UNIQUE,
              name TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// 目录维护入口（配置/种子数据），不在导入流程中调用
    pub fn insert(&self, code: &str, name: &str) -> RepositoryResult<InputType> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO hr_payslip_input_type (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(InputType {
            input_type_id: conn.last_insert_rowid(),
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<InputType>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT input_type_id, code, name FROM hr_payslip_input_type ORDER BY code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InputType {
                input_type_id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl InputTypeCatalog for InputTypeRepository {
    fn find_by_code(&self, code: &str) -> RepositoryResult<Option<InputType>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT input_type_id, code, name
                FROM hr_payslip_input_type
                WHERE code = ?1
                LIMIT 1
                "#,
                params![code.trim()],
                |row| {
                    Ok(InputType {
                        input_type_id: row.get(0)?,
                        code: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    #[test]
    fn test_find_by_code_trims_input() {
        let repo = InputTypeRepository::from_connection(open_in_memory_connection().unwrap())
            .unwrap();
        repo.insert("TRN", "Transport Allowance").unwrap();

        let found = repo.find_by_code("  TRN ").unwrap().unwrap();
        assert_eq!(found.name, "Transport Allowance");
        assert!(repo.find_by_code("trn").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let repo = InputTypeRepository::from_connection(open_in_memory_connection().unwrap())
            .unwrap();
        repo.insert("DED", "Deduction").unwrap();
        let err = repo.insert("DED", "Deduction again").unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }
}
