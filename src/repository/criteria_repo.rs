// ==========================================
// 采购授标引擎 - 评标标准仓储
// ==========================================
// 每个申购单至多一套评标标准；重新定义时整体替换
// ==========================================

use crate::domain::criteria::{Criterion, EvaluationCriteria};
use crate::domain::types::CriterionCategory;
use crate::repository::codec::{format_ts, parse_enum, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct CriteriaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CriteriaRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存评标标准（同一申购单已有则先删后插）
    pub fn replace_in_tx(conn: &Connection, criteria: &EvaluationCriteria) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM evaluation_criteria WHERE requisition_id = ?1",
            params![criteria.requisition_id],
        )?;

        conn.execute(
            r#"
            INSERT INTO evaluation_criteria (
                criteria_id, requisition_id, financial_weight, technical_weight, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                criteria.criteria_id,
                criteria.requisition_id,
                criteria.financial_weight,
                criteria.technical_weight,
                format_ts(&criteria.created_at),
            ],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO evaluation_criterion (
                criterion_id, criteria_id, category, name, weight, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for c in &criteria.criteria {
            stmt.execute(params![
                c.criterion_id,
                criteria.criteria_id,
                c.category.to_db_str(),
                c.name,
                c.weight,
                c.position,
            ])?;
        }

        Ok(())
    }

    pub fn find_by_requisition(&self, requisition_id: &str) -> RepositoryResult<Option<EvaluationCriteria>> {
        let conn = self.get_conn()?;
        Self::find_by_requisition_in_tx(&conn, requisition_id)
    }

    pub fn find_by_requisition_in_tx(
        conn: &Connection,
        requisition_id: &str,
    ) -> RepositoryResult<Option<EvaluationCriteria>> {
        let header = conn
            .query_row(
                r#"
                SELECT criteria_id, financial_weight, technical_weight, created_at
                FROM evaluation_criteria
                WHERE requisition_id = ?1
                "#,
                params![requisition_id],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        parse_ts(3, &created_at)?,
                    ))
                },
            )
            .optional()?;

        let (criteria_id, financial_weight, technical_weight, created_at) = match header {
            Some(h) => h,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT criterion_id, category, name, weight, position
            FROM evaluation_criterion
            WHERE criteria_id = ?1
            ORDER BY position ASC
            "#,
        )?;
        let criteria = stmt
            .query_map(params![criteria_id], |row| {
                let category: String = row.get(1)?;
                Ok(Criterion {
                    criterion_id: row.get(0)?,
                    category: parse_enum(1, &category, CriterionCategory::from_db_str)?,
                    name: row.get(2)?,
                    weight: row.get(3)?,
                    position: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // 已持久化的标准在写入前校验过，这里直接组装
        Ok(Some(EvaluationCriteria {
            criteria_id,
            requisition_id: requisition_id.to_string(),
            financial_weight,
            technical_weight,
            criteria,
            created_at,
        }))
    }
}
