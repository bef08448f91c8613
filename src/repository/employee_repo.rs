// ==========================================
// 薪资导入对账系统 - 员工仓储
// ==========================================
// 职责: 管理 hr_employee 表；提供工号精确匹配与姓名模糊匹配
// 说明: 查找只针对在职员工（active = 1）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{Employee, NameMatch};
use crate::repository::error::{connection_error, RepositoryError, RepositoryResult};
use crate::repository::payroll_store::EmployeeDirectory;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct EmployeeRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_employee(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        employee_id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

impl EmployeeRepository {
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
            CREATE TABLE IF NOT EXISTS hr_employee (
              employee_id INTEGER PRIMARY KEY AUTOINCREMENT,
              code TEXT UNIQUE,
              name TEXT NOT NULL,
              active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_hr_employee_name
              ON hr_employee(name, employee_id);
            "#,
        )?;
        Ok(())
    }

    /// 新增员工（种子数据/测试用）
    pub fn insert(&self, code: Option<&str>, name: &str) -> RepositoryResult<Employee> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO hr_employee (code, name, active) VALUES (?1, ?2, 1)",
            params![code, name],
        )?;
        Ok(Employee {
            employee_id: conn.last_insert_rowid(),
            code: code.map(|c| c.to_string()),
            name: name.to_string(),
            active: true,
        })
    }

    /// 归档/恢复员工
    pub fn set_active(&self, employee_id: i64, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE hr_employee SET active = ?1 WHERE employee_id = ?2",
            params![active as i32, employee_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Employee".to_string(),
                id: employee_id.to_string(),
            });
        }
        Ok(())
    }
}

impl EmployeeDirectory for EmployeeRepository {
    fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Employee>> {
        let conn = self.get_conn()?;
        let employee = conn
            .query_row(
                r#"
                SELECT employee_id, code, name, active
                FROM hr_employee
                WHERE active = 1 AND code = ?1
                ORDER BY employee_id
                LIMIT 1
                "#,
                params![code],
                map_employee,
            )
            .optional()?;
        Ok(employee)
    }

    fn find_by_name(&self, name: &str) -> RepositoryResult<NameMatch> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(NameMatch::none());
        }

        // SQLite 的 LIKE 只对 ASCII 忽略大小写，这里在内存中做 Unicode 小写比较
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT employee_id, code, name, active
            FROM hr_employee
            WHERE active = 1
            ORDER BY name, employee_id
            "#,
        )?;
        let rows = stmt.query_map([], map_employee)?;

        let mut first = None;
        let mut candidates = 0;
        for row in rows {
            let employee = row?;
            if employee.name.to_lowercase().contains(&needle) {
                candidates += 1;
                if first.is_none() {
                    first = Some(employee);
                }
            }
        }

        Ok(NameMatch {
            employee: first,
            candidates,
        })
    }

    fn get_employee(&self, employee_id: i64) -> RepositoryResult<Option<Employee>> {
        let conn = self.get_conn()?;
        let employee = conn
            .query_row(
                "SELECT employee_id, code, name, active FROM hr_employee WHERE employee_id = ?1",
                params![employee_id],
                map_employee,
            )
            .optional()?;
        Ok(employee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn setup() -> EmployeeRepository {
        EmployeeRepository::from_connection(open_in_memory_connection().unwrap()).unwrap()
    }

    #[test]
    fn test_open_unreachable_path_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing").join("payroll.db");
        assert!(matches!(
            EmployeeRepository::new(db_path.to_str().unwrap()),
            Err(RepositoryError::DatabaseConnectionError(_))
        ));
    }

    #[test]
    fn test_find_by_code_exact_only() {
        let repo = setup();
        repo.insert(Some("E001"), "Alice Perera").unwrap();

        assert!(repo.find_by_code("E001").unwrap().is_some());
        assert!(repo.find_by_code("e001").unwrap().is_none());
        assert!(repo.find_by_code("E00").unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_case_insensitive_substring() {
        let repo = setup();
        repo.insert(Some("E001"), "Alice Perera").unwrap();

        let m = repo.find_by_name("PERERA").unwrap();
        assert_eq!(m.employee.as_ref().unwrap().code.as_deref(), Some("E001"));
        assert_eq!(m.candidates, 1);
        assert!(!m.is_ambiguous());
    }

    #[test]
    fn test_find_by_name_first_match_wins_and_reports_candidates() {
        let repo = setup();
        repo.insert(Some("E002"), "Nimal Silva").unwrap();
        repo.insert(Some("E003"), "Kamal Silva").unwrap();

        let m = repo.find_by_name("silva").unwrap();
        // 按姓名排序，Kamal 在前
        assert_eq!(m.employee.as_ref().unwrap().name, "Kamal Silva");
        assert_eq!(m.candidates, 2);
        assert!(m.is_ambiguous());
    }

    #[test]
    fn test_archived_employee_not_matched() {
        let repo = setup();
        let e = repo.insert(Some("E009"), "Sunil Fernando").unwrap();
        repo.set_active(e.employee_id, false).unwrap();

        assert!(repo.find_by_code("E009").unwrap().is_none());
        assert_eq!(repo.find_by_name("Sunil").unwrap().candidates, 0);
        // 按 ID 读取仍可见
        assert!(repo.get_employee(e.employee_id).unwrap().is_some());
    }
}
