// ==========================================
// 薪资导入对账系统 - 工资单仓储
// ==========================================
// 职责: 管理合同/薪资结构/工资单/工资单输入表
// 约束:
// - 工资单 (employee_id, date_from, date_to) 唯一
// - 新建工资单在 IMMEDIATE 事务内复查期间重叠（防止并发重复创建）
// - 工资单输入 (payslip_id, input_type_id) 唯一
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{
    Contract, ContractState, NewPayslip, Payslip, PayslipInput, PayslipSlot, SalaryStructure,
    StructureType, UpsertOutcome,
};
use crate::repository::error::{connection_error, field_error, RepositoryError, RepositoryResult};
use crate::repository::payroll_store::PayslipStore;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub struct PayslipRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_payslip(row: &Row<'_>) -> rusqlite::Result<Payslip> {
    Ok(Payslip {
        payslip_id: row.get(0)?,
        employee_id: row.get(1)?,
        contract_id: row.get(2)?,
        struct_id: row.get(3)?,
        date_from: row.get(4)?,
        date_to: row.get(5)?,
    })
}

fn map_structure(row: &Row<'_>) -> rusqlite::Result<SalaryStructure> {
    Ok(SalaryStructure {
        struct_id: row.get(0)?,
        name: row.get(1)?,
        structure_type_id: row.get(2)?,
    })
}

/// 工资单输入原始行（amount 以文本存储）
struct PayslipInputRow {
    input_id: i64,
    payslip_id: i64,
    input_type_id: i64,
    amount: String,
    name: String,
}

impl PayslipInputRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            input_id: row.get(0)?,
            payslip_id: row.get(1)?,
            input_type_id: row.get(2)?,
            amount: row.get(3)?,
            name: row.get(4)?,
        })
    }

    fn into_domain(self) -> RepositoryResult<PayslipInput> {
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| field_error("hr_payslip_input.amount", e.to_string()))?;
        Ok(PayslipInput {
            input_id: self.input_id,
            payslip_id: self.payslip_id,
            input_type_id: self.input_type_id,
            amount,
            name: self.name,
        })
    }
}

impl PayslipRepository {
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
            CREATE TABLE IF NOT EXISTS hr_payroll_structure_type (
              structure_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              default_struct_id INTEGER REFERENCES hr_payroll_structure(struct_id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS hr_payroll_structure (
              struct_id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              structure_type_id INTEGER REFERENCES hr_payroll_structure_type(structure_type_id)
            );

            CREATE TABLE IF NOT EXISTS hr_contract (
              contract_id INTEGER PRIMARY KEY AUTOINCREMENT,
              employee_id INTEGER NOT NULL,
              state TEXT NOT NULL DEFAULT 'draft',
              structure_type_id INTEGER REFERENCES hr_payroll_structure_type(structure_type_id),
              date_start TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_hr_contract_employee
              ON hr_contract(employee_id, state);

            CREATE TABLE IF NOT EXISTS hr_payslip (
              payslip_id INTEGER PRIMARY KEY AUTOINCREMENT,
              employee_id INTEGER NOT NULL,
              contract_id INTEGER REFERENCES hr_contract(contract_id),
              struct_id INTEGER REFERENCES hr_payroll_structure(struct_id),
              date_from TEXT NOT NULL,
              date_to TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              CHECK (date_from <= date_to),
              UNIQUE (employee_id, date_from, date_to)
            );

            CREATE TABLE IF NOT EXISTS hr_payslip_input (
              input_id INTEGER PRIMARY KEY AUTOINCREMENT,
              payslip_id INTEGER NOT NULL REFERENCES hr_payslip(payslip_id) ON DELETE CASCADE,
              input_type_id INTEGER NOT NULL,
              amount TEXT NOT NULL,
              name TEXT NOT NULL DEFAULT '',
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE (payslip_id, input_type_id)
            );
            "#,
        )?;
        Ok(())
    }

    // ===== 主数据维护（种子数据/测试用）=====

    pub fn insert_structure(
        &self,
        name: &str,
        structure_type_id: Option<i64>,
    ) -> RepositoryResult<SalaryStructure> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO hr_payroll_structure (name, structure_type_id) VALUES (?1, ?2)",
            params![name, structure_type_id],
        )?;
        Ok(SalaryStructure {
            struct_id: conn.last_insert_rowid(),
            name: name.to_string(),
            structure_type_id,
        })
    }

    pub fn insert_structure_type(
        &self,
        name: &str,
        default_struct_id: Option<i64>,
    ) -> RepositoryResult<StructureType> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO hr_payroll_structure_type (name, default_struct_id) VALUES (?1, ?2)",
            params![name, default_struct_id],
        )?;
        Ok(StructureType {
            structure_type_id: conn.last_insert_rowid(),
            name: name.to_string(),
            default_struct_id,
        })
    }

    pub fn set_default_structure(
        &self,
        structure_type_id: i64,
        struct_id: Option<i64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE hr_payroll_structure_type SET default_struct_id = ?1 WHERE structure_type_id = ?2",
            params![struct_id, structure_type_id],
        )?;
        Ok(())
    }

    pub fn insert_contract(
        &self,
        employee_id: i64,
        state: ContractState,
        structure_type_id: Option<i64>,
        date_start: NaiveDate,
    ) -> RepositoryResult<Contract> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO hr_contract (employee_id, state, structure_type_id, date_start)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![employee_id, state.as_str(), structure_type_id, date_start],
        )?;
        Ok(Contract {
            contract_id: conn.last_insert_rowid(),
            employee_id,
            state,
            structure_type_id,
            date_start,
        })
    }

    // ===== 查询 =====

    pub fn list_payslips(&self, employee_id: i64) -> RepositoryResult<Vec<Payslip>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT payslip_id, employee_id, contract_id, struct_id, date_from, date_to
            FROM hr_payslip
            WHERE employee_id = ?1
            ORDER BY date_from, payslip_id
            "#,
        )?;
        let rows = stmt.query_map(params![employee_id], map_payslip)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_inputs(&self, payslip_id: i64) -> RepositoryResult<Vec<PayslipInput>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT input_id, payslip_id, input_type_id, amount, name
            FROM hr_payslip_input
            WHERE payslip_id = ?1
            ORDER BY input_id
            "#,
        )?;
        let rows = stmt.query_map(params![payslip_id], PayslipInputRow::from_row)?;

        let mut inputs = Vec::new();
        for row in rows {
            inputs.push(row?.into_domain()?);
        }
        Ok(inputs)
    }

    /// 写入已存在的工资单（模拟人工先建单的场景）
    pub fn insert_payslip(&self, payslip: &NewPayslip) -> RepositoryResult<Payslip> {
        let conn = self.get_conn()?;
        Self::insert_payslip_conn(&conn, payslip)
    }

    fn insert_payslip_conn(conn: &Connection, payslip: &NewPayslip) -> RepositoryResult<Payslip> {
        conn.execute(
            r#"
            INSERT INTO hr_payslip (employee_id, contract_id, struct_id, date_from, date_to)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                payslip.employee_id,
                payslip.contract_id,
                payslip.struct_id,
                payslip.date_from,
                payslip.date_to,
            ],
        )?;
        Ok(Payslip {
            payslip_id: conn.last_insert_rowid(),
            employee_id: payslip.employee_id,
            contract_id: Some(payslip.contract_id),
            struct_id: Some(payslip.struct_id),
            date_from: payslip.date_from,
            date_to: payslip.date_to,
        })
    }

    fn find_overlapping_conn(
        conn: &Connection,
        employee_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Option<Payslip>> {
        let found = conn
            .query_row(
                r#"
                SELECT payslip_id, employee_id, contract_id, struct_id, date_from, date_to
                FROM hr_payslip
                WHERE employee_id = ?1 AND date_from <= ?2 AND date_to >= ?3
                ORDER BY date_from, payslip_id
                LIMIT 1
                "#,
                params![employee_id, date_to, date_from],
                map_payslip,
            )
            .optional()?;
        Ok(found)
    }

    fn find_input_conn(
        conn: &Connection,
        payslip_id: i64,
        input_type_id: i64,
    ) -> RepositoryResult<Option<PayslipInput>> {
        let row = conn
            .query_row(
                r#"
                SELECT input_id, payslip_id, input_type_id, amount, name
                FROM hr_payslip_input
                WHERE payslip_id = ?1 AND input_type_id = ?2
                LIMIT 1
                "#,
                params![payslip_id, input_type_id],
                PayslipInputRow::from_row,
            )
            .optional()?;
        row.map(PayslipInputRow::into_domain).transpose()
    }
}

impl PayslipStore for PayslipRepository {
    fn find_active_contract(
        &self,
        employee_id: i64,
        states: &[ContractState],
    ) -> RepositoryResult<Option<Contract>> {
        if states.is_empty() {
            return Ok(None);
        }

        let placeholders: Vec<String> = (0..states.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            r#"
            SELECT contract_id, employee_id, state, structure_type_id, date_start
            FROM hr_contract
            WHERE employee_id = ?1 AND state IN ({})
            ORDER BY date_start DESC, contract_id DESC
            LIMIT 1
            "#,
            placeholders.join(", ")
        );

        let mut values = vec![Value::Integer(employee_id)];
        values.extend(states.iter().map(|s| Value::Text(s.as_str().to_string())));

        let conn = self.get_conn()?;
        let raw = conn
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, NaiveDate>(4)?,
                ))
            })
            .optional()?;

        match raw {
            None => Ok(None),
            Some((contract_id, employee_id, state, structure_type_id, date_start)) => {
                let state = ContractState::from_str(&state)
                    .map_err(|e| field_error("hr_contract.state", e))?;
                Ok(Some(Contract {
                    contract_id,
                    employee_id,
                    state,
                    structure_type_id,
                    date_start,
                }))
            }
        }
    }

    fn find_default_structure(
        &self,
        structure_type_id: i64,
    ) -> RepositoryResult<Option<SalaryStructure>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT s.struct_id, s.name, s.structure_type_id
                FROM hr_payroll_structure_type t
                JOIN hr_payroll_structure s ON s.struct_id = t.default_struct_id
                WHERE t.structure_type_id = ?1
                "#,
                params![structure_type_id],
                map_structure,
            )
            .optional()?;
        Ok(found)
    }

    fn find_any_structure(&self) -> RepositoryResult<Option<SalaryStructure>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT struct_id, name, structure_type_id
                FROM hr_payroll_structure
                ORDER BY struct_id
                LIMIT 1
                "#,
                [],
                map_structure,
            )
            .optional()?;
        Ok(found)
    }

    fn find_overlapping_payslip(
        &self,
        employee_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Option<Payslip>> {
        let conn = self.get_conn()?;
        Self::find_overlapping_conn(&conn, employee_id, date_from, date_to)
    }

    fn create_payslip_if_absent(&self, payslip: &NewPayslip) -> RepositoryResult<PayslipSlot> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) =
            Self::find_overlapping_conn(&tx, payslip.employee_id, payslip.date_from, payslip.date_to)?
        {
            tx.commit()?;
            return Ok(PayslipSlot::Existing(existing));
        }

        let created = Self::insert_payslip_conn(&tx, payslip)?;
        tx.commit()?;
        Ok(PayslipSlot::Created(created))
    }

    fn upsert_input(
        &self,
        payslip_id: i64,
        input_type_id: i64,
        amount: Decimal,
        name: &str,
    ) -> RepositoryResult<(PayslipInput, UpsertOutcome)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = match Self::find_input_conn(&tx, payslip_id, input_type_id)? {
            Some(existing) => {
                tx.execute(
                    r#"
                    UPDATE hr_payslip_input
                    SET amount = ?1, name = ?2, updated_at = datetime('now')
                    WHERE input_id = ?3
                    "#,
                    params![amount.to_string(), name, existing.input_id],
                )?;
                (
                    PayslipInput {
                        amount,
                        name: name.to_string(),
                        ..existing
                    },
                    UpsertOutcome::Updated,
                )
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO hr_payslip_input (payslip_id, input_type_id, amount, name)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![payslip_id, input_type_id, amount.to_string(), name],
                )?;
                (
                    PayslipInput {
                        input_id: tx.last_insert_rowid(),
                        payslip_id,
                        input_type_id,
                        amount,
                        name: name.to_string(),
                    },
                    UpsertOutcome::Created,
                )
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}
